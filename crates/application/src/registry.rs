//! 连接注册表（进程级）。
//!
//! principal -> 活跃连接的唯一映射，外加连接时缓存的已接受群组。
//! 所有可变操作由单一互斥区串行化；任何投递写入都发生在释放
//! 互斥区之后（先拷贝目标列表再写，绝不持锁跨 I/O）。
//! 投递走每连接的无界 mpsc 通道，真正的 socket 写由连接自己的
//! 写任务完成，慢客户端不会阻塞这里。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use domain::{GroupId, UserId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dto::{OutboundFrame, PresenceFrame};

/// 投递结果。收件人不在线不算错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Absent,
    Error,
}

#[derive(Debug, Clone)]
struct ClientHandle {
    serial: u64,
    groups: Vec<GroupId>,
    sender: mpsc::UnboundedSender<OutboundFrame>,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    clients: Mutex<HashMap<UserId, ClientHandle>>,
    next_serial: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册连接。同一 principal 的第二次 attach 驱逐第一个：
    /// 旧通道在释放互斥区之后被关闭，旧连接的写任务随之结束。
    /// 返回的守卫在所有退出路径上保证注销（含在线名单广播）。
    pub fn attach(
        self: &Arc<Self>,
        user: UserId,
        groups: Vec<GroupId>,
        sender: mpsc::UnboundedSender<OutboundFrame>,
    ) -> ConnectionGuard {
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed) + 1;
        let evicted = {
            let mut clients = self.clients.lock().expect("registry mutex poisoned");
            clients.insert(
                user,
                ClientHandle {
                    serial,
                    groups,
                    sender,
                },
            )
        };
        if let Some(old) = evicted {
            // 锁已释放；丢弃旧 sender 即关闭旧连接的出站通道。
            info!(user = %user, "evicting previous connection for principal");
            drop(old);
        }
        ConnectionGuard {
            registry: Arc::clone(self),
            user,
            serial,
        }
    }

    /// 注销指定序号的连接；序号不匹配（已被更新的 attach 取代）则不动。
    /// 返回是否确有移除。
    fn detach_if_current(&self, user: UserId, serial: u64) -> bool {
        let mut clients = self.clients.lock().expect("registry mutex poisoned");
        match clients.get(&user) {
            Some(handle) if handle.serial == serial => {
                clients.remove(&user);
                true
            }
            _ => false,
        }
    }

    /// 尽力投递一帧。通道已关闭视作连接死亡：移出注册表并广播在线名单。
    pub fn deliver(&self, user: UserId, frame: OutboundFrame) -> DeliveryStatus {
        let handle = {
            let clients = self.clients.lock().expect("registry mutex poisoned");
            clients.get(&user).cloned()
        };
        match handle {
            None => DeliveryStatus::Absent,
            Some(handle) => {
                if handle.sender.send(frame).is_ok() {
                    DeliveryStatus::Delivered
                } else {
                    warn!(user = %user, "connection channel closed, detaching");
                    if self.detach_if_current(user, handle.serial) {
                        self.broadcast_presence();
                    }
                    DeliveryStatus::Error
                }
            }
        }
    }

    /// 对谓词命中的连接广播一帧。先在互斥区内拷贝目标列表，
    /// 再在区外逐个写；单个收件人失败只记日志，不中断广播。
    pub fn broadcast_snapshot<F>(&self, frame: &OutboundFrame, predicate: F)
    where
        F: Fn(UserId, &[GroupId]) -> bool,
    {
        let targets: Vec<(UserId, mpsc::UnboundedSender<OutboundFrame>)> = {
            let clients = self.clients.lock().expect("registry mutex poisoned");
            clients
                .iter()
                .filter(|(user, handle)| predicate(**user, &handle.groups))
                .map(|(user, handle)| (*user, handle.sender.clone()))
                .collect()
        };
        for (user, sender) in targets {
            if sender.send(frame.clone()).is_err() {
                debug!(user = %user, "broadcast skipped closed connection");
            }
        }
    }

    /// 当前在线 principal 集合（升序，便于断言与展示）。
    pub fn snapshot_principals(&self) -> Vec<UserId> {
        let clients = self.clients.lock().expect("registry mutex poisoned");
        let mut ids: Vec<UserId> = clients.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn is_online(&self, user: UserId) -> bool {
        let clients = self.clients.lock().expect("registry mutex poisoned");
        clients.contains_key(&user)
    }

    /// 向所有在线连接下发完整在线名单快照。
    pub fn broadcast_presence(&self) {
        let online: Vec<i64> = self
            .snapshot_principals()
            .into_iter()
            .map(|id| id.0)
            .collect();
        let frame = OutboundFrame::Presence(PresenceFrame::new(online));
        self.broadcast_snapshot(&frame, |_, _| true);
    }
}

/// attach 的作用域守卫。Drop 时把自己这一代的注册项移除并广播
/// 在线名单；若已被更新的连接取代则什么都不做。
pub struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    user: UserId,
    serial: u64,
}

impl ConnectionGuard {
    pub fn user(&self) -> UserId {
        self.user
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.registry.detach_if_current(self.user, self.serial) {
            debug!(user = %self.user, "connection detached");
            self.registry.broadcast_presence();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::ErrorFrame;

    fn test_frame() -> OutboundFrame {
        OutboundFrame::Error(ErrorFrame::new("ping"))
    }

    fn channel() -> (
        mpsc::UnboundedSender<OutboundFrame>,
        mpsc::UnboundedReceiver<OutboundFrame>,
    ) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn deliver_reaches_attached_client() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, mut rx) = channel();
        let _guard = registry.attach(UserId(1), vec![], tx);

        assert_eq!(
            registry.deliver(UserId(1), test_frame()),
            DeliveryStatus::Delivered
        );
        assert!(rx.recv().await.is_some());
        assert_eq!(
            registry.deliver(UserId(2), test_frame()),
            DeliveryStatus::Absent
        );
    }

    #[tokio::test]
    async fn second_attach_evicts_first() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx1, mut rx1) = channel();
        let guard1 = registry.attach(UserId(1), vec![], tx1);
        let (tx2, mut rx2) = channel();
        let guard2 = registry.attach(UserId(1), vec![], tx2);

        // 旧通道已关闭
        assert!(rx1.recv().await.is_none());
        // 新通道收件
        assert_eq!(
            registry.deliver(UserId(1), test_frame()),
            DeliveryStatus::Delivered
        );
        assert!(rx2.recv().await.is_some());

        // 被驱逐连接的守卫退出不影响新注册
        drop(guard1);
        assert!(registry.is_online(UserId(1)));
        drop(guard2);
        assert!(!registry.is_online(UserId(1)));
    }

    #[tokio::test]
    async fn guard_detaches_on_drop() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, _rx) = channel();
        let guard = registry.attach(UserId(5), vec![], tx);
        assert_eq!(registry.snapshot_principals(), vec![UserId(5)]);
        drop(guard);
        assert!(registry.snapshot_principals().is_empty());
        assert_eq!(
            registry.deliver(UserId(5), test_frame()),
            DeliveryStatus::Absent
        );
    }

    #[tokio::test]
    async fn presence_snapshot_sent_to_everyone() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        let _g1 = registry.attach(UserId(1), vec![], tx1);
        let _g2 = registry.attach(UserId(2), vec![], tx2);

        registry.broadcast_presence();

        for rx in [&mut rx1, &mut rx2] {
            let frame = rx.recv().await.expect("presence frame");
            let json = serde_json::to_value(&frame).unwrap();
            assert_eq!(json["type"], "online_users");
            assert_eq!(json["online_users"], serde_json::json!([1, 2]));
        }
    }

    #[tokio::test]
    async fn broadcast_filters_by_cached_groups() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        let (tx3, mut rx3) = channel();
        let _g1 = registry.attach(UserId(1), vec![GroupId(9)], tx1);
        let _g2 = registry.attach(UserId(2), vec![GroupId(9)], tx2);
        let _g3 = registry.attach(UserId(3), vec![GroupId(4)], tx3);

        // 群 9 的 typing 扇出：排除发送者 1
        registry.broadcast_snapshot(&test_frame(), |user, groups| {
            user != UserId(1) && groups.contains(&GroupId(9))
        });

        assert!(rx2.recv().await.is_some());
        assert!(rx1.try_recv().is_err());
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn deliver_to_closed_channel_detaches() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, rx) = channel();
        let _guard = registry.attach(UserId(1), vec![], tx);
        drop(rx);

        assert_eq!(
            registry.deliver(UserId(1), test_frame()),
            DeliveryStatus::Error
        );
        assert!(!registry.is_online(UserId(1)));
    }
}
