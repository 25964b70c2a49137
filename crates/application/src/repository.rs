//! 仓储端口定义。
//!
//! 基础设施层提供 Postgres 实现；单元测试使用内存假实现。
//! 所有操作只返回领域类型与 `RepositoryError`。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    EventId, EventResponse, FollowRequest, FollowStatus, Group, GroupEvent, GroupId,
    GroupMembership, GroupMessage, MembershipRole, MembershipStatus, MessageId, NewNotification,
    Notification, NotificationId, Post, PostId, PrivateMessage, RepositoryError, Timestamp, User,
    UserId,
};
use serde::Serialize;

/// 消息历史固定页大小：每页 20 行，按 sent_at 降序。
pub const MESSAGE_PAGE_SIZE: i64 = 20;

/// 用户存储适配器（C1）。对核心只读。
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_nickname(&self, nickname: &str) -> Result<Option<User>, RepositoryError>;
}

/// 带请求者昵称的待处理关注请求（列表展示用）。
#[derive(Debug, Clone, Serialize)]
pub struct FollowRequestView {
    pub request_id: i64,
    pub requester_id: UserId,
    pub requester_name: String,
    pub created_at: Timestamp,
}

/// 社交图适配器（C2）。
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// 双向：任一方向存在 accepted 边即为 true。发私信的判定用它。
    async fn accepted_between(&self, a: UserId, b: UserId) -> Result<bool, RepositoryError>;

    /// 单向：`follower` 是否已被接受地关注 `following`。
    async fn is_accepted(&self, follower: UserId, following: UserId)
        -> Result<bool, RepositoryError>;

    /// followers 表是否已有该有序对（任意状态）。
    async fn edge_exists(&self, follower: UserId, following: UserId)
        -> Result<bool, RepositoryError>;

    /// 幂等写入 accepted 边（已存在则忽略）。
    async fn insert_accepted_edge(
        &self,
        follower: UserId,
        following: UserId,
        at: Timestamp,
    ) -> Result<(), RepositoryError>;

    /// 删除边，返回是否确有删除。
    async fn delete_edge(&self, follower: UserId, following: UserId)
        -> Result<bool, RepositoryError>;

    async fn find_request(
        &self,
        requester: UserId,
        target: UserId,
    ) -> Result<Option<FollowRequest>, RepositoryError>;

    async fn find_request_by_id(&self, id: i64) -> Result<Option<FollowRequest>, RepositoryError>;

    /// 写入新的 pending 请求；同一有序对的旧行（终态）被替换。
    async fn replace_request(
        &self,
        requester: UserId,
        target: UserId,
        at: Timestamp,
    ) -> Result<(), RepositoryError>;

    async fn set_request_status(
        &self,
        id: i64,
        status: FollowStatus,
        responded_at: Timestamp,
    ) -> Result<(), RepositoryError>;

    /// 删除该有序对的请求行（unfollow 时清理用）。
    async fn delete_requests(
        &self,
        requester: UserId,
        target: UserId,
    ) -> Result<(), RepositoryError>;

    async fn list_followers(&self, user: UserId) -> Result<Vec<User>, RepositoryError>;
    async fn list_following(&self, user: UserId) -> Result<Vec<User>, RepositoryError>;
    async fn pending_requests(
        &self,
        target: UserId,
    ) -> Result<Vec<FollowRequestView>, RepositoryError>;
}

/// 群组适配器（C3）。
#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn find_by_id(&self, id: GroupId) -> Result<Option<Group>, RepositoryError>;

    async fn membership(
        &self,
        user: UserId,
        group: GroupId,
    ) -> Result<Option<GroupMembership>, RepositoryError>;

    /// 群内全部 accepted 成员（群消息扇出时实时解析）。
    async fn accepted_member_ids(&self, group: GroupId) -> Result<Vec<UserId>, RepositoryError>;

    /// 用户已接受的群（连接时缓存进注册表）。
    async fn accepted_group_ids(&self, user: UserId) -> Result<Vec<GroupId>, RepositoryError>;

    /// (user, group) 上唯一；重复插入返回 Conflict。
    async fn insert_membership(
        &self,
        user: UserId,
        group: GroupId,
        role: MembershipRole,
        status: MembershipStatus,
    ) -> Result<(), RepositoryError>;

    async fn update_status(
        &self,
        user: UserId,
        group: GroupId,
        status: MembershipStatus,
        joined_at: Timestamp,
    ) -> Result<(), RepositoryError>;

    async fn remove_membership(&self, user: UserId, group: GroupId)
        -> Result<bool, RepositoryError>;
}

/// 私聊目录条目：已关注的用户与最近一条消息。
#[derive(Debug, Clone, Serialize)]
pub struct ChatPartner {
    pub id: UserId,
    pub name: String,
    pub profile_type: String,
    pub last_message_time: DateTime<Utc>,
    pub last_message: String,
}

/// 群聊目录条目。
#[derive(Debug, Clone, Serialize)]
pub struct ChatGroupEntry {
    pub id: GroupId,
    pub name: String,
    pub last_message_time: DateTime<Utc>,
    pub last_message: String,
    pub member_count: i64,
}

/// 消息日志（C4）。两张表都是追加写。
///
/// 分页用 LIMIT/OFFSET 降序，时间戳相同不保证次序；
/// 并发插入下的分页稳定性不在契约内。
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn append_private(
        &self,
        sender: UserId,
        receiver: UserId,
        content: &str,
        at: Timestamp,
    ) -> Result<MessageId, RepositoryError>;

    async fn append_group(
        &self,
        group: GroupId,
        sender: UserId,
        content: &str,
        at: Timestamp,
    ) -> Result<MessageId, RepositoryError>;

    /// 两人会话里比 offset 更旧的最新 20 行，降序，连接发送者昵称。
    async fn page_private(
        &self,
        viewer: UserId,
        other: UserId,
        offset: i64,
    ) -> Result<Vec<PrivateMessage>, RepositoryError>;

    async fn page_group(
        &self,
        group: GroupId,
        offset: i64,
    ) -> Result<Vec<GroupMessage>, RepositoryError>;

    async fn chat_partners(&self, user: UserId) -> Result<Vec<ChatPartner>, RepositoryError>;
    async fn chat_groups(&self, user: UserId) -> Result<Vec<ChatGroupEntry>, RepositoryError>;
}

/// 通知日志（C5）。
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn append(
        &self,
        notification: NewNotification,
        at: Timestamp,
    ) -> Result<Notification, RepositoryError>;

    /// 只翻转属于 `recipient` 的行；返回是否命中。
    async fn mark_read(
        &self,
        recipient: UserId,
        id: NotificationId,
    ) -> Result<bool, RepositoryError>;

    async fn mark_read_many(
        &self,
        recipient: UserId,
        ids: &[NotificationId],
    ) -> Result<(), RepositoryError>;

    async fn mark_all_read(&self, recipient: UserId) -> Result<u64, RepositoryError>;

    async fn count_unread(&self, recipient: UserId) -> Result<i64, RepositoryError>;

    async fn delete(&self, recipient: UserId, id: NotificationId)
        -> Result<bool, RepositoryError>;

    /// 按 created_at 降序分页；read 的翻转由服务层在同一逻辑操作里完成。
    async fn page(
        &self,
        recipient: UserId,
        limit: i64,
        offset: i64,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError>;

    async fn count_total(
        &self,
        recipient: UserId,
        unread_only: bool,
    ) -> Result<i64, RepositoryError>;
}

/// 帖子可见性查询端口（只为 post_visible 谓词服务）。
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, RepositoryError>;
    async fn is_allowed_follower(&self, post: PostId, user: UserId)
        -> Result<bool, RepositoryError>;
}

/// 群组活动端口。
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn insert(
        &self,
        group: GroupId,
        creator: UserId,
        title: &str,
        description: &str,
        event_time: Timestamp,
    ) -> Result<GroupEvent, RepositoryError>;

    async fn find_by_id(&self, id: EventId) -> Result<Option<GroupEvent>, RepositoryError>;

    async fn upsert_response(
        &self,
        event: EventId,
        user: UserId,
        response: EventResponse,
    ) -> Result<(), RepositoryError>;

    /// 回复 going 且仍是群内 accepted 成员的用户（活动提醒的收件人）。
    async fn going_member_ids(
        &self,
        event: EventId,
        group: GroupId,
    ) -> Result<Vec<UserId>, RepositoryError>;
}
