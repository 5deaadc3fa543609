use elevate_core::{AppError, AppResult};
use elevate_domain::{AccessRequest, Condition, RequestStatus};

use crate::access_request_ports::{AccessRequestStore, PageRequest, RecordPage};

/// Store access path of a listing.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Listing<'a> {
    Requester(&'a str),
    Status(RequestStatus),
    Scan,
}

/// Reads every page of a listing, preserving store order.
pub(crate) async fn drain_listing(
    store: &dyn AccessRequestStore,
    listing: Listing<'_>,
    filter: Option<&Condition>,
    page_size: usize,
) -> AppResult<Vec<AccessRequest>> {
    let mut records = Vec::new();
    let mut cursor = None;

    loop {
        let page = PageRequest {
            limit: page_size,
            cursor: cursor.clone(),
        };
        let RecordPage { items, next_cursor } = match listing {
            Listing::Requester(requester) => {
                store.query_by_requester(requester, filter, page).await?
            }
            Listing::Status(status) => store.query_by_status(status, filter, page).await?,
            Listing::Scan => store.scan(filter, page).await?,
        };
        records.extend(items);

        match next_cursor {
            Some(next) if cursor.as_ref() == Some(&next) => {
                return Err(AppError::Internal(format!(
                    "store returned the same page cursor '{next}' twice"
                )));
            }
            Some(next) => cursor = Some(next),
            None => return Ok(records),
        }
    }
}
