use chrono::{DateTime, Utc};

use super::*;

impl AccessRequestService {
    /// Lists the caller's own requests, newest first.
    pub async fn list_my_requests(&self, actor: &CallerClaims) -> AppResult<Vec<AccessRequest>> {
        let records = drain_listing(
            self.store.as_ref(),
            Listing::Requester(actor.subject()),
            None,
            self.config.page_size(),
        )
        .await?;

        Ok(self.promote_all(records, self.clock.now()).await)
    }

    /// Lists requests still awaiting review whose ttl has not elapsed.
    pub async fn list_pending(&self, actor: &CallerClaims) -> AppResult<Vec<AccessRequest>> {
        self.require_group(actor, self.config.reviewer_group(), "list pending requests")?;

        let now = self.clock.now();
        let unexpired = Attribute::Ttl.is().gt(now.timestamp());
        let records = drain_listing(
            self.store.as_ref(),
            Listing::Status(RequestStatus::Requested),
            Some(&unexpired),
            self.config.page_size(),
        )
        .await?;

        Ok(self.promote_all(records, now).await)
    }

    /// Lists requests a reviewer has acted on.
    pub async fn list_processed(&self, actor: &CallerClaims) -> AppResult<Vec<AccessRequest>> {
        self.require_group(
            actor,
            self.config.reviewer_group(),
            "list processed requests",
        )?;

        let processed = Attribute::Status
            .is()
            .none_of([RequestStatus::Requested, RequestStatus::Expired]);
        let records = drain_listing(
            self.store.as_ref(),
            Listing::Scan,
            Some(&processed),
            self.config.page_size(),
        )
        .await?;

        Ok(self.promote_all(records, self.clock.now()).await)
    }

    /// Lists every request.
    pub async fn list_all(&self, actor: &CallerClaims) -> AppResult<Vec<AccessRequest>> {
        self.require_group(actor, self.config.auditor_group(), "list all requests")?;

        let records = drain_listing(
            self.store.as_ref(),
            Listing::Scan,
            None,
            self.config.page_size(),
        )
        .await?;

        Ok(self.promote_all(records, self.clock.now()).await)
    }

    /// Applies read-time promotion and writes rewritten records back.
    ///
    /// Write-back failures are logged and do not fail the read; the next read repeats the
    /// promotion.
    async fn promote_all(
        &self,
        records: Vec<AccessRequest>,
        now: DateTime<Utc>,
    ) -> Vec<AccessRequest> {
        let mut promoted_records = Vec::with_capacity(records.len());

        for record in records {
            let Some(promoted) = record.promoted(now) else {
                promoted_records.push(record);
                continue;
            };

            match self.store.put(promoted.clone()).await {
                Ok(()) => info!(
                    request_id = %promoted.id(),
                    from = %record.status(),
                    to = %promoted.status(),
                    "access request promoted"
                ),
                Err(error) => warn!(
                    request_id = %promoted.id(),
                    to = %promoted.status(),
                    error = %error,
                    "failed to persist promoted access request"
                ),
            }

            promoted_records.push(promoted);
        }

        promoted_records
    }
}
