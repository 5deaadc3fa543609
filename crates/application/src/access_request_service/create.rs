use super::*;

impl AccessRequestService {
    /// Creates a request for the caller in the `Requested` state.
    ///
    /// The ttl is attached later by the ttl trigger, once the insert reaches the change feed.
    pub async fn create(
        &self,
        actor: &CallerClaims,
        input: AccessRequestInput,
    ) -> AppResult<AccessRequest> {
        let now = self.clock.now();
        let record = AccessRequest::new_request(
            actor.subject(),
            actor.email().map(str::to_owned),
            input,
            now,
        )?;

        if let ConditionalWrite::ConditionFailed { current } =
            self.store.insert(record.clone()).await?
        {
            warn!(
                request_id = %record.id(),
                existing_status = ?current.map(|existing| existing.status()),
                "access request key already taken"
            );
            return Err(AppError::DuplicateRequest(format!(
                "request '{}' already exists",
                record.id()
            )));
        }

        info!(
            request_id = %record.id(),
            requester = %record.requester(),
            account = %record.account(),
            role = %record.role(),
            duration_minutes = record.duration_minutes(),
            "access request created"
        );

        Ok(record)
    }
}
