//! 私聊与群聊消息。两张日志表都是追加写入，历史永不改写。

use serde::{Deserialize, Serialize};

use crate::value_objects::{GroupId, MessageId, Timestamp, UserId};

/// `messages` 表的一行，读路径上连接了发送者昵称。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateMessage {
    pub id: MessageId,
    pub sender: UserId,
    pub receiver: UserId,
    pub content: String,
    pub sent_at: Timestamp,
    pub sender_name: String,
}

/// `group_messages` 表的一行。发送者离群后历史消息保留。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMessage {
    pub id: MessageId,
    pub group: GroupId,
    pub sender: UserId,
    pub content: String,
    pub sent_at: Timestamp,
    pub sender_name: String,
}
