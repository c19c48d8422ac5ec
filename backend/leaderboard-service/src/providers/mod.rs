//! Social-graph provider abstraction
//!
//! The ingestion job only needs [`SocialGraphProvider::get_top_users`]; the
//! remaining operations back the follow/unfollow passthrough endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Fid;

pub mod neynar;

pub use neynar::NeynarProvider;

/// User profile as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarcasterUser {
    pub fid: Fid,
    pub username: String,
    pub display_name: String,
    pub pfp_url: Option<String>,
    pub follower_count: i64,
    pub following_count: i64,
}

/// A single follower relationship (`source_fid` follows `target_fid`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowerEdge {
    pub source_fid: Fid,
    pub target_fid: Fid,
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Provider {path} failed: {status} {body}")]
    Api {
        path: String,
        status: u16,
        body: String,
    },

    #[error("Signer not approved: {0}")]
    SignerNotApproved(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[async_trait]
pub trait SocialGraphProvider: Send + Sync {
    /// Top `limit` users by follower count
    async fn get_top_users(&self, limit: usize) -> ProviderResult<Vec<FarcasterUser>>;

    /// Bulk lookup; unknown fids are silently absent from the result
    async fn get_users_by_fids(&self, fids: &[Fid]) -> ProviderResult<Vec<FarcasterUser>>;

    /// Recent followers of `fid` (the provider caps `limit` at 100)
    async fn get_followers(&self, fid: Fid, limit: usize) -> ProviderResult<Vec<FollowerEdge>>;

    /// Follow `target_fid` on behalf of the signer's owner
    async fn follow_user(&self, signer_uuid: &str, target_fid: Fid) -> ProviderResult<()>;

    /// Unfollow `target_fid` on behalf of the signer's owner
    async fn unfollow_user(&self, signer_uuid: &str, target_fid: Fid) -> ProviderResult<()>;

    async fn get_user_by_fid(&self, fid: Fid) -> ProviderResult<Option<FarcasterUser>> {
        let users = self.get_users_by_fids(&[fid]).await?;
        Ok(users.into_iter().next())
    }
}
