use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::api::{ElectionApi, EventTimes, NewEvent};
use crate::error::ApiError;
use crate::models::{
    CampaignComment, CampaignPost, Event, Nominee, PendingNominee, NomineeTally, TallyCounts,
    VerificationCode, Voter,
};

/// JSON-over-HTTP implementation of the election service contract.
pub struct HttpApi {
    base: String,
    client: Client,
}

impl HttpApi {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self { base, client }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let resp = self
            .client
            .get(format!("{}{}", self.base, path))
            .query(query)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ApiError> {
        let resp = self
            .client
            .post(format!("{}{}", self.base, path))
            .json(body)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ApiError::Remote {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json::<T>().await?)
    }
}

/// Lenient wire-timestamp decoding: a value that does not parse is clamped
/// to the epoch, which classifies as `finished` and counts down as zero.
fn parse_instant(raw: &str) -> DateTime<Utc> {
    match raw.parse::<DateTime<Utc>>() {
        Ok(t) => t,
        Err(_) => {
            warn!(raw, "unparseable timestamp on the wire, clamping to epoch");
            DateTime::UNIX_EPOCH
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct EventDto {
    #[serde(rename = "_id")]
    id: Uuid,
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Description", default)]
    description: Option<String>,
    #[serde(rename = "ElectionType")]
    election_type: crate::models::ElectionType,
    #[serde(rename = "votingMode")]
    voting_mode: crate::models::VotingMode,
    #[serde(rename = "RegEndTime")]
    reg_end: String,
    #[serde(rename = "VoteStartTime")]
    vote_start: String,
    #[serde(rename = "VoteEndTime")]
    vote_end: String,
    #[serde(rename = "codeRotationMinutes", default)]
    code_rotation_minutes: Option<u32>,
}

impl From<EventDto> for Event {
    fn from(dto: EventDto) -> Self {
        Event {
            id: dto.id,
            title: dto.title,
            description: dto.description,
            election_type: dto.election_type,
            voting_mode: dto.voting_mode,
            reg_end: parse_instant(&dto.reg_end),
            vote_start: parse_instant(&dto.vote_start),
            vote_end: parse_instant(&dto.vote_end),
            code_rotation_minutes: dto.code_rotation_minutes,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NomineeTallyDto {
    #[serde(rename = "NomineeID")]
    nominee_id: Uuid,
    #[serde(rename = "NomineeIDName", default)]
    name: Option<String>,
    #[serde(rename = "TotalVote", default)]
    total_vote: Option<i64>,
    #[serde(rename = "TotalRank", default)]
    total_rank: Option<i64>,
}

impl From<NomineeTallyDto> for NomineeTally {
    fn from(dto: NomineeTallyDto) -> Self {
        NomineeTally {
            name: dto.name.unwrap_or_else(|| dto.nominee_id.to_string()),
            nominee_id: dto.nominee_id,
            tally: dto.total_vote.or(dto.total_rank).unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TallyDto {
    #[serde(rename = "NomineeListForSingleAndMultiVote", default)]
    vote_counts: Vec<NomineeTallyDto>,
    #[serde(rename = "NomineeListForRank", default)]
    rank_scores: Vec<NomineeTallyDto>,
}

#[derive(Debug, Deserialize)]
struct MemberDto {
    #[serde(rename = "UserID")]
    user_id: Uuid,
    #[serde(rename = "FullName", default)]
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct CommentDto {
    #[serde(rename = "_id")]
    id: Uuid,
    #[serde(rename = "OwnerName", default)]
    owner_name: String,
    #[serde(rename = "Comment", default)]
    comment: String,
    #[serde(rename = "createdAt")]
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct PostDto {
    #[serde(rename = "_id")]
    id: Uuid,
    #[serde(rename = "OwnerName", default)]
    owner_name: String,
    #[serde(rename = "Content", default)]
    content: String,
    #[serde(rename = "Likes", default)]
    likes: u32,
    #[serde(rename = "Dislikes", default)]
    dislikes: u32,
    #[serde(rename = "createdAt")]
    created_at: String,
    #[serde(rename = "Comments", default)]
    comments: Vec<CommentDto>,
}

impl From<PostDto> for CampaignPost {
    fn from(dto: PostDto) -> Self {
        CampaignPost {
            id: dto.id,
            author_name: dto.owner_name,
            content: dto.content,
            likes: dto.likes,
            dislikes: dto.dislikes,
            created_at: parse_instant(&dto.created_at),
            comments: dto
                .comments
                .into_iter()
                .map(|c| CampaignComment {
                    id: c.id,
                    author_name: c.owner_name,
                    body: c.comment,
                    created_at: parse_instant(&c.created_at),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CodeDto {
    #[serde(rename = "currentVoteCode")]
    code: String,
    #[serde(rename = "currentCodeExpiresAt")]
    expires_at: String,
}

fn event_query(event_id: Uuid) -> [(&'static str, String); 1] {
    [("EventID", event_id.to_string())]
}

#[async_trait]
impl ElectionApi for HttpApi {
    async fn list_events(&self) -> Result<Vec<Event>, ApiError> {
        let events: Vec<EventDto> = self.get_json("/api/V1/admin/events", &[]).await?;
        Ok(events.into_iter().map(Event::from).collect())
    }

    async fn get_tally(&self, event_id: Uuid) -> Result<TallyCounts, ApiError> {
        let dto: TallyDto = self
            .get_json("/api/V1/admin/countVote", &event_query(event_id))
            .await?;
        Ok(TallyCounts {
            vote_counts: dto.vote_counts.into_iter().map(NomineeTally::from).collect(),
            rank_scores: dto.rank_scores.into_iter().map(NomineeTally::from).collect(),
        })
    }

    async fn get_pending_nominees(&self, event_id: Uuid) -> Result<Vec<PendingNominee>, ApiError> {
        let members: Vec<MemberDto> = self
            .get_json("/api/V1/admin/pendingNominees", &event_query(event_id))
            .await?;
        Ok(members
            .into_iter()
            .map(|m| PendingNominee {
                user_id: m.user_id,
                full_name: m.full_name,
            })
            .collect())
    }

    async fn approve_nominee(&self, event_id: Uuid, nominee_id: Uuid) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post_json(
                "/api/V1/admin/approveNominee",
                &json!({ "EventID": event_id, "NomineeID": nominee_id }),
            )
            .await?;
        Ok(())
    }

    async fn get_voters(&self, event_id: Uuid) -> Result<Vec<Voter>, ApiError> {
        let members: Vec<MemberDto> = self
            .get_json("/api/V1/admin/voters", &event_query(event_id))
            .await?;
        Ok(members
            .into_iter()
            .map(|m| Voter {
                user_id: m.user_id,
                full_name: m.full_name,
            })
            .collect())
    }

    async fn get_nominees(&self, event_id: Uuid) -> Result<Vec<Nominee>, ApiError> {
        let members: Vec<MemberDto> = self
            .get_json("/api/V1/nominees", &event_query(event_id))
            .await?;
        Ok(members
            .into_iter()
            .map(|m| Nominee {
                user_id: m.user_id,
                full_name: m.full_name,
            })
            .collect())
    }

    async fn list_campaign_posts(&self, event_id: Uuid) -> Result<Vec<CampaignPost>, ApiError> {
        let posts: Vec<PostDto> = self
            .get_json("/api/V1/campaign/posts", &event_query(event_id))
            .await?;
        Ok(posts.into_iter().map(CampaignPost::from).collect())
    }

    async fn delete_campaign_post(&self, event_id: Uuid, post_id: Uuid) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post_json(
                "/api/V1/campaign/deletePost",
                &json!({ "EventID": event_id, "PostID": post_id }),
            )
            .await?;
        Ok(())
    }

    async fn delete_campaign_comment(
        &self,
        event_id: Uuid,
        comment_id: Uuid,
    ) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post_json(
                "/api/V1/campaign/deleteComment",
                &json!({ "EventID": event_id, "CommentID": comment_id }),
            )
            .await?;
        Ok(())
    }

    async fn current_code(&self, event_id: Uuid) -> Result<VerificationCode, ApiError> {
        let envelope: Envelope<CodeDto> = self
            .get_json("/api/V1/admin/getCurrentVoteCode", &event_query(event_id))
            .await?;
        Ok(VerificationCode {
            code: envelope.data.code,
            expires_at: parse_instant(&envelope.data.expires_at),
        })
    }

    async fn rotate_code(&self, event_id: Uuid) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post_json(
                "/api/V1/admin/rotateVoteCode",
                &json!({ "EventID": event_id }),
            )
            .await?;
        Ok(())
    }

    async fn create_event(&self, fields: NewEvent) -> Result<Event, ApiError> {
        let body = json!({
            "Title": fields.title,
            "Description": fields.description,
            "ElectionType": fields.election_type,
            "votingMode": fields.voting_mode,
            "RegEndTime": fields.reg_end.to_rfc3339(),
            "VoteStartTime": fields.vote_start.to_rfc3339(),
            "VoteEndTime": fields.vote_end.to_rfc3339(),
            "codeRotationMinutes": fields.code_rotation_minutes,
        });
        let created: EventDto = self.post_json("/api/V1/admin/createEvent", &body).await?;
        Ok(created.into())
    }

    async fn update_event_times(&self, event_id: Uuid, times: EventTimes) -> Result<(), ApiError> {
        let body = json!({
            "EventID": event_id,
            "RegEndTime": times.reg_end.to_rfc3339(),
            "VoteStartTime": times.vote_start.to_rfc3339(),
            "VoteEndTime": times.vote_end.to_rfc3339(),
        });
        let _: serde_json::Value = self
            .post_json("/api/V1/admin/updateEventTimes", &body)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_dto_decodes_wire_casing() {
        let raw = json!({
            "_id": "7f2c1e70-37a4-4e7b-8f12-4a1b6f0c9d21",
            "Title": "Student Union Election",
            "ElectionType": "MultiVote",
            "votingMode": "onCampus",
            "RegEndTime": "2025-03-01T10:00:00Z",
            "VoteStartTime": "2025-03-01T12:00:00Z",
            "VoteEndTime": "2025-03-01T18:00:00Z",
            "codeRotationMinutes": 15,
        });
        let event: Event = serde_json::from_value::<EventDto>(raw).unwrap().into();
        assert_eq!(event.title, "Student Union Election");
        assert_eq!(event.election_type, crate::models::ElectionType::MultiVote);
        assert_eq!(event.voting_mode, crate::models::VotingMode::OnCampus);
        assert_eq!(event.code_rotation_minutes, Some(15));
        assert!(event.reg_end < event.vote_start && event.vote_start < event.vote_end);
    }

    #[test]
    fn bad_timestamp_clamps_to_epoch() {
        assert_eq!(parse_instant("not a time"), DateTime::UNIX_EPOCH);
        assert_eq!(
            parse_instant("2025-03-01T10:00:00Z"),
            "2025-03-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn tally_dto_falls_back_to_id_for_missing_name() {
        let raw = json!({
            "NomineeListForSingleAndMultiVote": [
                { "NomineeID": "7f2c1e70-37a4-4e7b-8f12-4a1b6f0c9d21", "TotalVote": 4 }
            ],
        });
        let dto: TallyDto = serde_json::from_value(raw).unwrap();
        let tally = NomineeTally::from(dto.vote_counts.into_iter().next().unwrap());
        assert_eq!(tally.tally, 4);
        assert_eq!(tally.name, "7f2c1e70-37a4-4e7b-8f12-4a1b6f0c9d21");
    }
}
