use uuid::Uuid;

use crate::api::ElectionApi;
use crate::error::ApiError;
use crate::models::{CampaignPost, PendingNominee};

/// A moderation mutation. Always remote-first: `commit` confirms the effect
/// with the remote service, and only then does `apply` touch the cached
/// collections. A failed commit leaves the local view untouched and the
/// error goes back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Approve a pending nominee; the pending entry is keyed by user id.
    ApproveNominee { user_id: Uuid },
    DeletePost { post_id: Uuid },
    DeleteComment { post_id: Uuid, comment_id: Uuid },
}

impl Mutation {
    pub async fn commit(&self, api: &dyn ElectionApi, event_id: Uuid) -> Result<(), ApiError> {
        match *self {
            Mutation::ApproveNominee { user_id } => api.approve_nominee(event_id, user_id).await,
            Mutation::DeletePost { post_id } => api.delete_campaign_post(event_id, post_id).await,
            Mutation::DeleteComment { comment_id, .. } => {
                api.delete_campaign_comment(event_id, comment_id).await
            }
        }
    }

    pub fn apply(&self, pending: &mut Vec<PendingNominee>, posts: &mut Vec<CampaignPost>) {
        match *self {
            Mutation::ApproveNominee { user_id } => {
                pending.retain(|p| p.user_id != user_id);
            }
            Mutation::DeletePost { post_id } => {
                posts.retain(|p| p.id != post_id);
            }
            Mutation::DeleteComment { post_id, comment_id } => {
                // Only the owning post's comment list is touched.
                if let Some(post) = posts.iter_mut().find(|p| p.id == post_id) {
                    post.comments.retain(|c| c.id != comment_id);
                }
            }
        }
    }
}
