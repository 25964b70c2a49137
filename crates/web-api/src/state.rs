use std::sync::Arc;

use application::{ChatService, FollowService, GroupService, NotificationService};

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub notification_service: Arc<NotificationService>,
    pub follow_service: Arc<FollowService>,
    pub group_service: Arc<GroupService>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    pub fn new(
        chat_service: Arc<ChatService>,
        notification_service: Arc<NotificationService>,
        follow_service: Arc<FollowService>,
        group_service: Arc<GroupService>,
        jwt_service: Arc<JwtService>,
    ) -> Self {
        Self {
            chat_service,
            notification_service,
            follow_service,
            group_service,
            jwt_service,
        }
    }
}
