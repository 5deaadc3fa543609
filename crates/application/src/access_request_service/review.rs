use super::*;

#[derive(Debug, Clone, Copy)]
enum Decision {
    Approve,
    Reject,
}

impl AccessRequestService {
    /// Approves a pending request.
    ///
    /// Expiration is `review_time + duration_minutes` of the stored request.
    pub async fn approve(&self, actor: &CallerClaims, key: &RecordKey) -> AppResult<AccessRequest> {
        self.review(actor, key, Decision::Approve).await
    }

    /// Rejects a pending request.
    pub async fn reject(&self, actor: &CallerClaims, key: &RecordKey) -> AppResult<AccessRequest> {
        self.review(actor, key, Decision::Reject).await
    }

    async fn review(
        &self,
        actor: &CallerClaims,
        key: &RecordKey,
        decision: Decision,
    ) -> AppResult<AccessRequest> {
        self.require_group(actor, self.config.reviewer_group(), "review access requests")?;

        let now = self.clock.now();
        let reviewer = actor.subject().to_owned();
        let update = match decision {
            Decision::Approve => RecordUpdate::Approve {
                reviewer,
                review_time: now,
            },
            Decision::Reject => RecordUpdate::Reject {
                reviewer,
                review_time: now,
            },
        };
        let guard = review_guard(actor.subject(), now);

        match self.store.update_if(key, &update, &guard).await? {
            ConditionalWrite::Applied(record) => {
                info!(
                    request_id = %record.id(),
                    reviewer = %actor.subject(),
                    status = %record.status(),
                    "access request reviewed"
                );
                Ok(record)
            }
            ConditionalWrite::ConditionFailed { current } => {
                let reason = ReviewRejection::diagnose(current.as_ref(), actor.subject(), now);
                warn!(
                    request_id = %key.id,
                    reviewer = %actor.subject(),
                    decision = update.kind(),
                    reason = reason.as_str(),
                    "review refused by store guard"
                );
                Err(AppError::ReviewConflict(
                    "request cannot be reviewed".to_owned(),
                ))
            }
        }
    }
}
