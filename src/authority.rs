//! Hickory DNS authority answering from the published record store.

use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{LowerName, Name, RecordSet, RecordType};
use hickory_server::authority::{
    Authority, LookupControlFlow, LookupError, LookupOptions, LookupRecords, MessageRequest,
    UpdateResult, ZoneType,
};
use hickory_server::server::RequestInfo;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::metrics::{self, QueryResult, Timer};
use crate::publisher::RecordStore;

/// Authority rooted at `.` so that `.local.`, `in-addr.arpa.` and `ip6.arpa.`
/// names are all served from the same store.
pub struct RecordAuthority {
    origin: LowerName,
    store: RecordStore,
}

impl RecordAuthority {
    /// Create an authority over `store`.
    pub fn new(store: RecordStore) -> Self {
        Self {
            origin: LowerName::new(&Name::root()),
            store,
        }
    }

    /// Collect published records into a record set.
    fn build_record_set(&self, name: &LowerName, rtype: RecordType) -> Option<RecordSet> {
        let records = self.store.lookup(name, rtype);
        if records.is_empty() {
            return None;
        }

        let mut record_set = RecordSet::new(Name::from(name.clone()), rtype, self.store.serial());
        for record in records {
            record_set.insert(record, 0);
        }
        Some(record_set)
    }
}

#[async_trait]
impl Authority for RecordAuthority {
    type Lookup = LookupRecords;

    fn zone_type(&self) -> ZoneType {
        ZoneType::Primary
    }

    fn is_axfr_allowed(&self) -> bool {
        false
    }

    fn origin(&self) -> &LowerName {
        &self.origin
    }

    async fn lookup(
        &self,
        name: &LowerName,
        rtype: RecordType,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        let timer = Timer::start();
        let rtype_str = format!("{:?}", rtype);

        trace!(name = %name, rtype = ?rtype, "DNS lookup");

        match self.build_record_set(name, rtype) {
            Some(record_set) => {
                debug!(name = %name, rtype = ?rtype, count = record_set.iter().len(), "lookup: returning records");
                metrics::record_query(&rtype_str, QueryResult::Success, timer.elapsed());
                LookupControlFlow::Break(Ok(LookupRecords::new(
                    lookup_options,
                    Arc::new(record_set),
                )))
            }
            None if self.store.has_name(name) => {
                debug!(name = %name, rtype = ?rtype, "lookup: no records of this type");
                metrics::record_query(&rtype_str, QueryResult::NoData, timer.elapsed());
                LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)))
            }
            None => {
                debug!(name = %name, "lookup: name not published");
                metrics::record_query(&rtype_str, QueryResult::NxDomain, timer.elapsed());
                LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NXDomain)))
            }
        }
    }

    async fn search(
        &self,
        request_info: RequestInfo<'_>,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        self.lookup(
            request_info.query.name(),
            request_info.query.query_type(),
            lookup_options,
        )
        .await
    }

    async fn get_nsec_records(
        &self,
        _name: &LowerName,
        _lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        // DNSSEC not supported
        LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)))
    }

    async fn update(&self, _update: &MessageRequest) -> UpdateResult<bool> {
        // Records only change through the dispatcher
        Err(ResponseCode::NotImp)
    }
}
