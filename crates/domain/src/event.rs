//! 群组活动。活动创建触发对全体已接受成员的通知，
//! 提醒只发给回复 going 的成员。

use serde::{Deserialize, Serialize};

use crate::value_objects::{EventId, GroupId, Timestamp, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEvent {
    pub id: EventId,
    pub group: GroupId,
    pub creator: UserId,
    pub title: String,
    pub description: String,
    pub event_time: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventResponse {
    Going,
    NotGoing,
}

impl EventResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Going => "going",
            Self::NotGoing => "not_going",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "going" => Some(Self::Going),
            "not_going" => Some(Self::NotGoing),
            _ => None,
        }
    }
}
