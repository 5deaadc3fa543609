use super::*;

impl AccessRequestService {
    /// Deletes one of the caller's requests while it is still `Requested` or `Expired`.
    pub async fn delete(&self, actor: &CallerClaims, key: &RecordKey) -> AppResult<()> {
        match self.store.delete_if(key, &delete_guard(actor.subject())).await? {
            ConditionalWrite::Applied(record) => {
                info!(
                    request_id = %record.id(),
                    requester = %actor.subject(),
                    status = %record.status(),
                    "access request deleted"
                );
                Ok(())
            }
            ConditionalWrite::ConditionFailed { current } => {
                warn!(
                    request_id = %key.id,
                    caller = %actor.subject(),
                    exists = current.is_some(),
                    status = current.as_ref().map(|record| record.status().as_str()),
                    "delete refused by store guard"
                );
                Err(AppError::DeleteConflict(format!(
                    "request '{}' cannot be deleted",
                    key.id
                )))
            }
        }
    }
}
