//! 单元测试用的内存仓储假实现与便捷构造器。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use domain::{
    EventId, EventResponse, FollowRequest, FollowStatus, Group, GroupEvent, GroupId,
    GroupMembership, GroupMessage, MembershipRole, MembershipStatus, MessageId, NewNotification,
    Nickname, Notification, NotificationId, Post, PostId, PrivateMessage, ProfileVisibility,
    RepositoryError, Timestamp, User, UserId,
};

use crate::clock::Clock;
use crate::repository::{
    ChatGroupEntry, ChatPartner, EventRepository, FollowRepository, FollowRequestView,
    GroupRepository, MessageRepository, NotificationRepository, PostRepository, UserRepository,
    MESSAGE_PAGE_SIZE,
};

pub fn ts(secs: i64) -> Timestamp {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn user(id: i64, nickname: &str, visibility: ProfileVisibility) -> User {
    User {
        id: UserId(id),
        nickname: Nickname::parse(nickname).unwrap(),
        visibility,
        created_at: ts(0),
    }
}

/// 固定时钟。
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

#[derive(Default)]
pub struct InMemoryUsers {
    users: Mutex<HashMap<UserId, User>>,
}

impl InMemoryUsers {
    pub fn with(users: Vec<User>) -> Arc<Self> {
        let store = Self::default();
        {
            let mut map = store.users.lock().unwrap();
            for user in users {
                map.insert(user.id, user);
            }
        }
        Arc::new(store)
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_nickname(&self, nickname: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.nickname.as_str() == nickname)
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryFollows {
    pub edges: Mutex<HashSet<(UserId, UserId)>>,
    pub requests: Mutex<Vec<FollowRequest>>,
    next_id: AtomicI64,
}

impl InMemoryFollows {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_edges(edges: &[(i64, i64)]) -> Arc<Self> {
        let store = Self::default();
        {
            let mut set = store.edges.lock().unwrap();
            for (a, b) in edges {
                set.insert((UserId(*a), UserId(*b)));
            }
        }
        Arc::new(store)
    }

    pub fn request_status(&self, requester: UserId, target: UserId) -> Option<FollowStatus> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.requester == requester && r.target == target)
            .map(|r| r.status)
    }
}

#[async_trait]
impl FollowRepository for InMemoryFollows {
    async fn accepted_between(&self, a: UserId, b: UserId) -> Result<bool, RepositoryError> {
        let edges = self.edges.lock().unwrap();
        Ok(edges.contains(&(a, b)) || edges.contains(&(b, a)))
    }

    async fn is_accepted(
        &self,
        follower: UserId,
        following: UserId,
    ) -> Result<bool, RepositoryError> {
        Ok(self.edges.lock().unwrap().contains(&(follower, following)))
    }

    async fn edge_exists(
        &self,
        follower: UserId,
        following: UserId,
    ) -> Result<bool, RepositoryError> {
        Ok(self.edges.lock().unwrap().contains(&(follower, following)))
    }

    async fn insert_accepted_edge(
        &self,
        follower: UserId,
        following: UserId,
        _at: Timestamp,
    ) -> Result<(), RepositoryError> {
        self.edges.lock().unwrap().insert((follower, following));
        Ok(())
    }

    async fn delete_edge(
        &self,
        follower: UserId,
        following: UserId,
    ) -> Result<bool, RepositoryError> {
        Ok(self.edges.lock().unwrap().remove(&(follower, following)))
    }

    async fn find_request(
        &self,
        requester: UserId,
        target: UserId,
    ) -> Result<Option<FollowRequest>, RepositoryError> {
        Ok(self
            .requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.requester == requester && r.target == target)
            .cloned())
    }

    async fn find_request_by_id(&self, id: i64) -> Result<Option<FollowRequest>, RepositoryError> {
        Ok(self
            .requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn replace_request(
        &self,
        requester: UserId,
        target: UserId,
        at: Timestamp,
    ) -> Result<(), RepositoryError> {
        let mut requests = self.requests.lock().unwrap();
        requests.retain(|r| !(r.requester == requester && r.target == target));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        requests.push(FollowRequest {
            id,
            requester,
            target,
            status: FollowStatus::Pending,
            created_at: at,
            responded_at: None,
        });
        Ok(())
    }

    async fn set_request_status(
        &self,
        id: i64,
        status: FollowStatus,
        responded_at: Timestamp,
    ) -> Result<(), RepositoryError> {
        let mut requests = self.requests.lock().unwrap();
        if let Some(request) = requests.iter_mut().find(|r| r.id == id) {
            request.status = status;
            request.responded_at = Some(responded_at);
        }
        Ok(())
    }

    async fn delete_requests(
        &self,
        requester: UserId,
        target: UserId,
    ) -> Result<(), RepositoryError> {
        self.requests
            .lock()
            .unwrap()
            .retain(|r| !(r.requester == requester && r.target == target));
        Ok(())
    }

    async fn list_followers(&self, _user: UserId) -> Result<Vec<User>, RepositoryError> {
        Ok(Vec::new())
    }

    async fn list_following(&self, _user: UserId) -> Result<Vec<User>, RepositoryError> {
        Ok(Vec::new())
    }

    async fn pending_requests(
        &self,
        target: UserId,
    ) -> Result<Vec<FollowRequestView>, RepositoryError> {
        Ok(self
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.target == target && r.status == FollowStatus::Pending)
            .map(|r| FollowRequestView {
                request_id: r.id,
                requester_id: r.requester,
                requester_name: String::new(),
                created_at: r.created_at,
            })
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryGroups {
    pub groups: Mutex<HashMap<GroupId, Group>>,
    pub memberships: Mutex<HashMap<(UserId, GroupId), GroupMembership>>,
}

impl InMemoryGroups {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_group(&self, id: i64, title: &str, creator: i64) {
        self.groups.lock().unwrap().insert(
            GroupId(id),
            Group {
                id: GroupId(id),
                title: title.to_owned(),
                creator: UserId(creator),
                created_at: ts(0),
            },
        );
        // 群主自动成为 accepted 成员
        self.set_membership(creator, id, MembershipRole::Creator, MembershipStatus::Accepted);
    }

    pub fn set_membership(
        &self,
        user: i64,
        group: i64,
        role: MembershipRole,
        status: MembershipStatus,
    ) {
        self.memberships.lock().unwrap().insert(
            (UserId(user), GroupId(group)),
            GroupMembership {
                user: UserId(user),
                group: GroupId(group),
                role,
                status,
                joined_at: Some(ts(0)),
            },
        );
    }

    pub fn status_of(&self, user: i64, group: i64) -> Option<MembershipStatus> {
        self.memberships
            .lock()
            .unwrap()
            .get(&(UserId(user), GroupId(group)))
            .map(|m| m.status)
    }
}

#[async_trait]
impl GroupRepository for InMemoryGroups {
    async fn find_by_id(&self, id: GroupId) -> Result<Option<Group>, RepositoryError> {
        Ok(self.groups.lock().unwrap().get(&id).cloned())
    }

    async fn membership(
        &self,
        user: UserId,
        group: GroupId,
    ) -> Result<Option<GroupMembership>, RepositoryError> {
        Ok(self.memberships.lock().unwrap().get(&(user, group)).cloned())
    }

    async fn accepted_member_ids(&self, group: GroupId) -> Result<Vec<UserId>, RepositoryError> {
        let mut ids: Vec<UserId> = self
            .memberships
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.group == group && m.status.is_accepted())
            .map(|m| m.user)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn accepted_group_ids(&self, user: UserId) -> Result<Vec<GroupId>, RepositoryError> {
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.user == user && m.status.is_accepted())
            .map(|m| m.group)
            .collect())
    }

    async fn insert_membership(
        &self,
        user: UserId,
        group: GroupId,
        role: MembershipRole,
        status: MembershipStatus,
    ) -> Result<(), RepositoryError> {
        let mut memberships = self.memberships.lock().unwrap();
        if memberships.contains_key(&(user, group)) {
            return Err(RepositoryError::Conflict);
        }
        memberships.insert(
            (user, group),
            GroupMembership {
                user,
                group,
                role,
                status,
                joined_at: None,
            },
        );
        Ok(())
    }

    async fn update_status(
        &self,
        user: UserId,
        group: GroupId,
        status: MembershipStatus,
        joined_at: Timestamp,
    ) -> Result<(), RepositoryError> {
        let mut memberships = self.memberships.lock().unwrap();
        match memberships.get_mut(&(user, group)) {
            Some(membership) => {
                membership.status = status;
                membership.joined_at = Some(joined_at);
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn remove_membership(
        &self,
        user: UserId,
        group: GroupId,
    ) -> Result<bool, RepositoryError> {
        Ok(self.memberships.lock().unwrap().remove(&(user, group)).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryMessages {
    pub private: Mutex<Vec<PrivateMessage>>,
    pub group: Mutex<Vec<GroupMessage>>,
    next_id: AtomicI64,
    pub fail_appends: AtomicBool,
}

impl InMemoryMessages {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next_appends(&self) {
        self.fail_appends.store(true, Ordering::Relaxed);
    }

    fn next_id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn check_failure(&self) -> Result<(), RepositoryError> {
        if self.fail_appends.load(Ordering::Relaxed) {
            Err(RepositoryError::storage("journal unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessages {
    async fn append_private(
        &self,
        sender: UserId,
        receiver: UserId,
        content: &str,
        at: Timestamp,
    ) -> Result<MessageId, RepositoryError> {
        self.check_failure()?;
        let id = self.next_id();
        self.private.lock().unwrap().push(PrivateMessage {
            id,
            sender,
            receiver,
            content: content.to_owned(),
            sent_at: at,
            sender_name: String::new(),
        });
        Ok(id)
    }

    async fn append_group(
        &self,
        group: GroupId,
        sender: UserId,
        content: &str,
        at: Timestamp,
    ) -> Result<MessageId, RepositoryError> {
        self.check_failure()?;
        let id = self.next_id();
        self.group.lock().unwrap().push(GroupMessage {
            id,
            group,
            sender,
            content: content.to_owned(),
            sent_at: at,
            sender_name: String::new(),
        });
        Ok(id)
    }

    async fn page_private(
        &self,
        viewer: UserId,
        other: UserId,
        offset: i64,
    ) -> Result<Vec<PrivateMessage>, RepositoryError> {
        let mut rows: Vec<PrivateMessage> = self
            .private
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                (m.sender == viewer && m.receiver == other)
                    || (m.sender == other && m.receiver == viewer)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(MESSAGE_PAGE_SIZE as usize)
            .collect())
    }

    async fn page_group(
        &self,
        group: GroupId,
        offset: i64,
    ) -> Result<Vec<GroupMessage>, RepositoryError> {
        let mut rows: Vec<GroupMessage> = self
            .group
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.group == group)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(MESSAGE_PAGE_SIZE as usize)
            .collect())
    }

    async fn chat_partners(&self, _user: UserId) -> Result<Vec<ChatPartner>, RepositoryError> {
        Ok(Vec::new())
    }

    async fn chat_groups(&self, _user: UserId) -> Result<Vec<ChatGroupEntry>, RepositoryError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct InMemoryNotifications {
    pub rows: Mutex<Vec<Notification>>,
    next_id: AtomicI64,
    pub fail_appends: AtomicBool,
}

impl InMemoryNotifications {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next_appends(&self) {
        self.fail_appends.store(true, Ordering::Relaxed);
    }

    pub fn push_row(&self, recipient: i64, read: bool, at: Timestamp) -> NotificationId {
        let id = NotificationId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.rows.lock().unwrap().push(Notification {
            id,
            recipient: UserId(recipient),
            kind: domain::NotificationKind::Other,
            message: "test".to_owned(),
            read,
            created_at: at,
            related_user: None,
            related_group: None,
            sender_name: None,
            group_name: None,
        });
        id
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotifications {
    async fn append(
        &self,
        notification: NewNotification,
        at: Timestamp,
    ) -> Result<Notification, RepositoryError> {
        if self.fail_appends.load(Ordering::Relaxed) {
            return Err(RepositoryError::storage("journal unavailable"));
        }
        let id = NotificationId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let row = Notification {
            id,
            recipient: notification.recipient,
            kind: notification.kind,
            message: notification.message,
            read: false,
            created_at: at,
            related_user: notification.related_user,
            related_group: notification.related_group,
            sender_name: None,
            group_name: None,
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn mark_read(
        &self,
        recipient: UserId,
        id: NotificationId,
    ) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|n| n.id == id && n.recipient == recipient) {
            Some(row) => {
                row.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_read_many(
        &self,
        recipient: UserId,
        ids: &[NotificationId],
    ) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        for row in rows.iter_mut() {
            if row.recipient == recipient && ids.contains(&row.id) {
                row.read = true;
            }
        }
        Ok(())
    }

    async fn mark_all_read(&self, recipient: UserId) -> Result<u64, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let mut count = 0;
        for row in rows.iter_mut() {
            if row.recipient == recipient && !row.read {
                row.read = true;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn count_unread(&self, recipient: UserId) -> Result<i64, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.recipient == recipient && !n.read)
            .count() as i64)
    }

    async fn delete(
        &self,
        recipient: UserId,
        id: NotificationId,
    ) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|n| !(n.id == id && n.recipient == recipient));
        Ok(rows.len() < before)
    }

    async fn page(
        &self,
        recipient: UserId,
        limit: i64,
        offset: i64,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let mut rows: Vec<Notification> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.recipient == recipient && (!unread_only || !n.read))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_total(
        &self,
        recipient: UserId,
        unread_only: bool,
    ) -> Result<i64, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.recipient == recipient && (!unread_only || !n.read))
            .count() as i64)
    }
}

#[derive(Default)]
pub struct InMemoryPosts {
    pub posts: Mutex<HashMap<PostId, Post>>,
    pub allowed: Mutex<HashSet<(PostId, UserId)>>,
}

impl InMemoryPosts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_post(&self, post: Post) {
        self.posts.lock().unwrap().insert(post.id, post);
    }

    pub fn allow(&self, post: i64, user: i64) {
        self.allowed
            .lock()
            .unwrap()
            .insert((PostId(post), UserId(user)));
    }
}

#[async_trait]
impl PostRepository for InMemoryPosts {
    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, RepositoryError> {
        Ok(self.posts.lock().unwrap().get(&id).cloned())
    }

    async fn is_allowed_follower(
        &self,
        post: PostId,
        user: UserId,
    ) -> Result<bool, RepositoryError> {
        Ok(self.allowed.lock().unwrap().contains(&(post, user)))
    }
}

#[derive(Default)]
pub struct InMemoryEvents {
    pub events: Mutex<HashMap<EventId, GroupEvent>>,
    pub responses: Mutex<HashMap<(EventId, UserId), EventResponse>>,
    next_id: AtomicI64,
}

impl InMemoryEvents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl EventRepository for InMemoryEvents {
    async fn insert(
        &self,
        group: GroupId,
        creator: UserId,
        title: &str,
        description: &str,
        event_time: Timestamp,
    ) -> Result<GroupEvent, RepositoryError> {
        let id = EventId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let event = GroupEvent {
            id,
            group,
            creator,
            title: title.to_owned(),
            description: description.to_owned(),
            event_time,
        };
        self.events.lock().unwrap().insert(id, event.clone());
        Ok(event)
    }

    async fn find_by_id(&self, id: EventId) -> Result<Option<GroupEvent>, RepositoryError> {
        Ok(self.events.lock().unwrap().get(&id).cloned())
    }

    async fn upsert_response(
        &self,
        event: EventId,
        user: UserId,
        response: EventResponse,
    ) -> Result<(), RepositoryError> {
        self.responses.lock().unwrap().insert((event, user), response);
        Ok(())
    }

    async fn going_member_ids(
        &self,
        event: EventId,
        _group: GroupId,
    ) -> Result<Vec<UserId>, RepositoryError> {
        let mut ids: Vec<UserId> = self
            .responses
            .lock()
            .unwrap()
            .iter()
            .filter(|((e, _), r)| *e == event && **r == EventResponse::Going)
            .map(|((_, u), _)| *u)
            .collect();
        ids.sort();
        Ok(ids)
    }
}
