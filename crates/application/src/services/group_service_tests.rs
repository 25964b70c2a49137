//! 群组服务单元测试：邀请/申请状态机、应答权限、群主保护、活动通知。

use std::sync::Arc;

use domain::{
    MembershipRole, MembershipStatus, NotificationKind, ProfileVisibility, UserId,
};

use crate::error::ApplicationError;
use crate::registry::ConnectionRegistry;
use crate::services::group_service::{
    GroupService, GroupServiceDependencies, MembershipRequestKind,
};
use crate::services::notification_service::{
    NotificationService, NotificationServiceDependencies,
};
use crate::test_support::{
    ts, user, FixedClock, InMemoryEvents, InMemoryGroups, InMemoryNotifications, InMemoryUsers,
};

struct Fixture {
    service: GroupService,
    groups: Arc<InMemoryGroups>,
    notifications: Arc<InMemoryNotifications>,
}

/// 群 7 由用户 1 创建；2 是普通成员；3、4 是路人。
fn fixture() -> Fixture {
    let users = InMemoryUsers::with(vec![
        user(1, "alice", ProfileVisibility::Public),
        user(2, "bob", ProfileVisibility::Public),
        user(3, "carol", ProfileVisibility::Public),
        user(4, "dave", ProfileVisibility::Public),
    ]);
    let groups = InMemoryGroups::new();
    groups.add_group(7, "rustaceans", 1);
    groups.set_membership(2, 7, MembershipRole::Member, MembershipStatus::Accepted);

    let notifications = InMemoryNotifications::new();
    let events = InMemoryEvents::new();
    let clock: Arc<dyn crate::clock::Clock> = Arc::new(FixedClock(ts(7_000)));
    let notification_service = Arc::new(NotificationService::new(
        NotificationServiceDependencies {
            user_repository: users.clone(),
            group_repository: groups.clone(),
            notification_repository: notifications.clone(),
            event_repository: events.clone(),
            registry: Arc::new(ConnectionRegistry::new()),
            clock: clock.clone(),
        },
    ));
    let service = GroupService::new(GroupServiceDependencies {
        user_repository: users,
        group_repository: groups.clone(),
        event_repository: events,
        notifications: notification_service,
        clock,
    });
    Fixture {
        service,
        groups,
        notifications,
    }
}

#[tokio::test]
async fn invite_creates_invited_row_and_notifies_target() {
    let fx = fixture();
    fx.service
        .invite(UserId(2), UserId(3), domain::GroupId(7))
        .await
        .unwrap();

    assert_eq!(fx.groups.status_of(3, 7), Some(MembershipStatus::Invited));
    let rows = fx.notifications.rows.lock().unwrap().clone();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].recipient, UserId(3));
    assert_eq!(rows[0].kind, NotificationKind::GroupInvite);
}

#[tokio::test]
async fn only_accepted_members_may_invite() {
    let fx = fixture();
    assert!(matches!(
        fx.service
            .invite(UserId(3), UserId(4), domain::GroupId(7))
            .await
            .unwrap_err(),
        ApplicationError::Domain(domain::DomainError::NotGroupMember)
    ));
}

#[tokio::test]
async fn existing_membership_row_blocks_invite_and_join_request() {
    let fx = fixture();
    fx.service
        .request_join(UserId(3), domain::GroupId(7))
        .await
        .unwrap();

    // 已申请的人不能再被邀请，反之亦然
    assert!(matches!(
        fx.service
            .invite(UserId(2), UserId(3), domain::GroupId(7))
            .await
            .unwrap_err(),
        ApplicationError::Domain(domain::DomainError::MembershipExists)
    ));
    assert!(matches!(
        fx.service
            .request_join(UserId(3), domain::GroupId(7))
            .await
            .unwrap_err(),
        ApplicationError::Domain(domain::DomainError::MembershipExists)
    ));
}

#[tokio::test]
async fn join_request_notifies_creator_and_creator_accepts() {
    let fx = fixture();
    fx.service
        .request_join(UserId(3), domain::GroupId(7))
        .await
        .unwrap();
    assert_eq!(fx.groups.status_of(3, 7), Some(MembershipStatus::Pending));

    let rows = fx.notifications.rows.lock().unwrap().clone();
    assert_eq!(rows[0].recipient, UserId(1));
    assert_eq!(rows[0].kind, NotificationKind::GroupRequest);

    fx.service
        .respond(
            UserId(1),
            domain::GroupId(7),
            MembershipRequestKind::JoinRequest,
            Some(UserId(3)),
            true,
        )
        .await
        .unwrap();
    assert_eq!(fx.groups.status_of(3, 7), Some(MembershipStatus::Accepted));

    // 裁决回声给申请者
    let rows = fx.notifications.rows.lock().unwrap().clone();
    assert_eq!(rows[1].recipient, UserId(3));
    assert_eq!(
        rows[1].message,
        "Your request to join 'rustaceans' was accepted"
    );
}

#[tokio::test]
async fn only_creator_decides_join_requests() {
    let fx = fixture();
    fx.service
        .request_join(UserId(3), domain::GroupId(7))
        .await
        .unwrap();

    assert!(matches!(
        fx.service
            .respond(
                UserId(2),
                domain::GroupId(7),
                MembershipRequestKind::JoinRequest,
                Some(UserId(3)),
                true,
            )
            .await
            .unwrap_err(),
        ApplicationError::Domain(domain::DomainError::OperationNotAllowed)
    ));
}

#[tokio::test]
async fn invitee_answers_own_invitation_and_reject_deletes_row() {
    let fx = fixture();
    fx.service
        .invite(UserId(1), UserId(3), domain::GroupId(7))
        .await
        .unwrap();

    // 群主不能替被邀请人应答邀请（membership 状态是 invited，群主视角没有待定申请）
    assert!(fx
        .service
        .respond(
            UserId(1),
            domain::GroupId(7),
            MembershipRequestKind::Invitation,
            None,
            true,
        )
        .await
        .is_err());

    fx.service
        .respond(
            UserId(3),
            domain::GroupId(7),
            MembershipRequestKind::Invitation,
            None,
            false,
        )
        .await
        .unwrap();
    // 拒绝即删行，之后可以重新申请
    assert_eq!(fx.groups.status_of(3, 7), None);
    fx.service
        .request_join(UserId(3), domain::GroupId(7))
        .await
        .unwrap();
}

#[tokio::test]
async fn creator_cannot_leave_but_members_can() {
    let fx = fixture();
    // 客户端侧这条映射为 400，见 web-api 的错误映射测试
    assert!(matches!(
        fx.service.leave(UserId(1), domain::GroupId(7)).await.unwrap_err(),
        ApplicationError::Domain(domain::DomainError::CannotLeaveAsCreator)
    ));
    fx.service.leave(UserId(2), domain::GroupId(7)).await.unwrap();
    assert_eq!(fx.groups.status_of(2, 7), None);
}

#[tokio::test]
async fn member_removal_respects_role_hierarchy() {
    let fx = fixture();
    fx.groups
        .set_membership(3, 7, MembershipRole::Admin, MembershipStatus::Accepted);
    fx.groups
        .set_membership(4, 7, MembershipRole::Member, MembershipStatus::Accepted);

    // 普通成员不能踢人
    assert!(fx
        .service
        .remove_member(UserId(2), domain::GroupId(7), UserId(4))
        .await
        .is_err());
    // 管理员不能踢群主
    assert!(fx
        .service
        .remove_member(UserId(3), domain::GroupId(7), UserId(1))
        .await
        .is_err());
    // 管理员不能踢管理员……但可以踢普通成员
    fx.service
        .remove_member(UserId(3), domain::GroupId(7), UserId(4))
        .await
        .unwrap();
    assert_eq!(fx.groups.status_of(4, 7), None);
    // 群主可以踢管理员
    fx.service
        .remove_member(UserId(1), domain::GroupId(7), UserId(3))
        .await
        .unwrap();
    assert_eq!(fx.groups.status_of(3, 7), None);
}

#[tokio::test]
async fn create_event_requires_membership_and_notifies_others() {
    let fx = fixture();
    assert!(fx
        .service
        .create_event(UserId(3), domain::GroupId(7), "meetup", "", ts(9_999))
        .await
        .is_err());

    let event = fx
        .service
        .create_event(UserId(1), domain::GroupId(7), "meetup", "rsvp", ts(9_999))
        .await
        .unwrap();
    assert_eq!(event.title, "meetup");

    // 只有 bob（成员、非创建者）收到
    let rows = fx.notifications.rows.lock().unwrap().clone();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].recipient, UserId(2));
    assert_eq!(rows[0].kind, NotificationKind::GroupEvent);
    assert_eq!(
        rows[0].message,
        "alice created a new event 'meetup' in rustaceans"
    );
}

#[tokio::test]
async fn event_response_requires_current_membership() {
    let fx = fixture();
    let event = fx
        .service
        .create_event(UserId(1), domain::GroupId(7), "meetup", "", ts(9_999))
        .await
        .unwrap();

    fx.service
        .respond_event(UserId(2), event.id, domain::EventResponse::Going)
        .await
        .unwrap();
    assert!(fx
        .service
        .respond_event(UserId(3), event.id, domain::EventResponse::Going)
        .await
        .is_err());
}
