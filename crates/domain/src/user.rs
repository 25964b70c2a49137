use serde::{Deserialize, Serialize};

use crate::value_objects::{Nickname, Timestamp, UserId};

/// 个人主页可见性。private 的用户只接受关注者的私信。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileVisibility {
    Public,
    Private,
}

impl ProfileVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    /// 数据库列以小写文本存储，未知值按 private 处理（最保守的降级）。
    pub fn parse(value: &str) -> Self {
        match value {
            "public" => Self::Public,
            _ => Self::Private,
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Self::Public)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub nickname: Nickname,
    pub visibility: ProfileVisibility,
    pub created_at: Timestamp,
}

impl User {
    pub fn is_public(&self) -> bool {
        self.visibility.is_public()
    }
}
