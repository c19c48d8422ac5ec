/// Neynar v2 client implementing [`SocialGraphProvider`]
///
/// The free API tier has no "top users" endpoint, so `get_top_users` bulk-looks-up
/// a fixed seed list and sorts it locally.
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{FarcasterUser, FollowerEdge, ProviderError, ProviderResult, SocialGraphProvider};
use crate::config::ProviderConfig;
use crate::domain::Fid;
use crate::metrics::record_provider_request;

pub const NEYNAR_BASE_URL: &str = "https://api.neynar.com/v2/farcaster";

/// Well-known high-follower accounts tracked by the leaderboard
pub const SEED_FIDS: [Fid; 50] = [
    3, 2, 12142, 5650, 99, 194, 1325, 7143, 239, 576, //
    1541, 680, 2433, 4085, 20909, 7637, 4167, 129, 8685, 1048, //
    557, 602, 2904, 3621, 1317, 6596, 4482, 7657, 2880, 1356, //
    5179, 4873, 7399, 2689, 617, 3642, 266, 1110, 12145, 8, //
    15983, 7601, 347, 1688, 2282, 4407, 616, 5094, 6023, 4823,
];

const MAX_FOLLOWERS_LIMIT: usize = 100;

#[derive(Clone)]
pub struct NeynarProvider {
    client: Client,
    base_url: String,
    api_key: String,
    seed_fids: Vec<Fid>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct NeynarUser {
    fid: Fid,
    username: Option<String>,
    display_name: Option<String>,
    pfp_url: Option<String>,
    follower_count: Option<i64>,
    following_count: Option<i64>,
}

impl From<NeynarUser> for FarcasterUser {
    fn from(u: NeynarUser) -> Self {
        Self {
            fid: u.fid,
            username: u.username.unwrap_or_default(),
            display_name: u.display_name.unwrap_or_default(),
            pfp_url: u.pfp_url,
            follower_count: u.follower_count.unwrap_or(0),
            following_count: u.following_count.unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BulkUsersResponse {
    #[serde(default)]
    users: Vec<NeynarUser>,
}

#[derive(Debug, Deserialize)]
struct FollowerRef {
    fid: Fid,
}

#[derive(Debug, Deserialize)]
struct FollowerItem {
    user: Option<FollowerRef>,
    fid: Option<Fid>,
}

#[derive(Debug, Deserialize)]
struct FollowerPage {
    #[serde(default)]
    users: Vec<FollowerItem>,
}

/// The followers endpoint has shipped both `{result: {users}}` and `{users}`
#[derive(Debug, Deserialize)]
struct FollowersResponse {
    result: Option<FollowerPage>,
    #[serde(default)]
    users: Vec<FollowerItem>,
}

#[derive(Debug, Serialize)]
struct FollowRequest<'a> {
    signer_uuid: &'a str,
    target_fids: [Fid; 1],
}

impl NeynarProvider {
    pub fn new(config: &ProviderConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            seed_fids: SEED_FIDS.to_vec(),
        })
    }

    /// Replace the tracked seed list
    pub fn with_seed_fids(mut self, seed_fids: Vec<Fid>) -> Self {
        self.seed_fids = seed_fids;
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, path: &str) -> ProviderResult<T> {
        debug!(endpoint, path, "Calling social-graph provider");

        let result = self.fetch_json(path).await;
        record_provider_request(endpoint, result.is_ok());
        if let Err(e) = &result {
            warn!(endpoint, error = %e, "Provider request failed");
        }
        result
    }

    async fn fetch_json<T: DeserializeOwned>(&self, path: &str) -> ProviderResult<T> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<T>().await?)
    }

    async fn send_follow(
        &self,
        endpoint: &str,
        method: Method,
        signer_uuid: &str,
        target_fid: Fid,
    ) -> ProviderResult<()> {
        let result = self.write_follow(method, signer_uuid, target_fid).await;
        record_provider_request(endpoint, result.is_ok());
        if let Err(e) = &result {
            warn!(endpoint, target_fid, error = %e, "Provider write failed");
        }
        result
    }

    async fn write_follow(
        &self,
        method: Method,
        signer_uuid: &str,
        target_fid: Fid,
    ) -> ProviderResult<()> {
        let path = "/user/follow";
        let body = FollowRequest {
            signer_uuid,
            target_fids: [target_fid],
        };

        let response = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        if text.to_ascii_lowercase().contains("signer") {
            return Err(ProviderError::SignerNotApproved(text));
        }
        Err(ProviderError::Api {
            path: path.to_string(),
            status: status.as_u16(),
            body: text,
        })
    }
}

#[async_trait]
impl SocialGraphProvider for NeynarProvider {
    async fn get_top_users(&self, limit: usize) -> ProviderResult<Vec<FarcasterUser>> {
        let mut users = self.get_users_by_fids(&self.seed_fids).await?;
        users.sort_by(|a, b| b.follower_count.cmp(&a.follower_count));
        users.truncate(limit);
        Ok(users)
    }

    async fn get_users_by_fids(&self, fids: &[Fid]) -> ProviderResult<Vec<FarcasterUser>> {
        if fids.is_empty() {
            return Ok(Vec::new());
        }

        let joined = fids
            .iter()
            .map(|fid| fid.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let response: BulkUsersResponse = self
            .get_json("user_bulk", &format!("/user/bulk?fids={}", joined))
            .await?;

        Ok(response.users.into_iter().map(FarcasterUser::from).collect())
    }

    async fn get_followers(&self, fid: Fid, limit: usize) -> ProviderResult<Vec<FollowerEdge>> {
        let limit = limit.min(MAX_FOLLOWERS_LIMIT);
        let response: FollowersResponse = self
            .get_json("followers", &format!("/followers?fid={}&limit={}", fid, limit))
            .await?;

        let items = match response.result {
            Some(page) => page.users,
            None => response.users,
        };

        Ok(items
            .into_iter()
            .filter_map(|item| item.user.map(|u| u.fid).or(item.fid))
            .map(|source_fid| FollowerEdge {
                source_fid,
                target_fid: fid,
            })
            .collect())
    }

    async fn follow_user(&self, signer_uuid: &str, target_fid: Fid) -> ProviderResult<()> {
        self.send_follow("follow", Method::POST, signer_uuid, target_fid)
            .await
    }

    async fn unfollow_user(&self, signer_uuid: &str, target_fid: Fid) -> ProviderResult<()> {
        self.send_follow("unfollow", Method::DELETE, signer_uuid, target_fid)
            .await
    }
}
