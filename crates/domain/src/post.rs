//! 帖子可见性的最小模型。
//!
//! 帖子本身的增删改查在外部服务里；核心只需要 `post_visible`
//! 谓词用到的字段。

use serde::{Deserialize, Serialize};

use crate::value_objects::{GroupId, PostId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostPrivacy {
    Public,
    /// 仅已接受的关注者可见。
    AlmostPrivate,
    /// 群帖对群成员可见；非群帖只对白名单关注者可见。
    Private,
}

impl PostPrivacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::AlmostPrivate => "almost_private",
            Self::Private => "private",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "public" => Self::Public,
            "almost_private" => Self::AlmostPrivate,
            _ => Self::Private,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author: UserId,
    pub privacy: PostPrivacy,
    pub group: Option<GroupId>,
}
