//! WebSocket 调度器（C8 的传输部分）。
//!
//! 每条连接的生命周期：握手（恰好一帧，带超时）→ 注册（驱逐同
//! principal 的旧连接，广播在线名单）→ 协作式读循环 → 拆除。
//! 拆除靠注册表守卫在所有退出路径上执行；出站写集中在单独的
//! 写任务里，读写互不阻塞。

use std::time::Duration;

use application::{ConnectedFrame, InboundFrame, OutboundFrame};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::UserId;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// 握手必须在这个窗口内完成，超时即关闭。
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// 握手帧：客户端连上后的第一帧。
#[derive(Debug, Deserialize)]
struct HandshakeFrame {
    token: String,
}

/// 连接入口。upgrade 之后的一切都在这里。
pub async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let user_id = match handshake(&mut socket, &state).await {
        Ok(user_id) => user_id,
        Err(reason) => {
            debug!(reason, "websocket handshake failed");
            let payload = serde_json::json!({ "error": reason }).to_string();
            let _ = socket.send(WsMessage::Text(payload.into())).await;
            return;
        }
    };

    // 出站通道：注册表和本函数都只往通道里写，socket 写集中在写任务
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundFrame>();

    let guard = match state.chat_service.connect(user_id, tx.clone()).await {
        Ok(guard) => guard,
        Err(err) => {
            warn!(user = %user_id, error = %err, "failed to register connection");
            let payload = serde_json::json!({ "error": "Connection failed" }).to_string();
            let _ = socket.send(WsMessage::Text(payload.into())).await;
            return;
        }
    };

    // 握手回执排在 attach 触发的在线名单之后，顺序与出站通道一致
    let _ = tx.send(OutboundFrame::Connected(ConnectedFrame::new(user_id)));
    // 本地 sender 用完即弃：此后通道的存活与注册表里的那份绑定，
    // 被新连接驱逐时 rx 才能收到关闭信号
    drop(tx);

    let (mut sink, mut stream) = socket.split();

    // 写任务：唯一写 socket 的地方
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let payload = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize outbound frame");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(payload.into())).await.is_err() {
                break;
            }
        }
        // 通道关闭：被新连接驱逐或正常拆除，都尽力给客户端一个 Close
        let _ = sink.send(WsMessage::Close(None)).await;
    });

    // 读任务：入站帧严格按到达顺序处理
    let chat_service = state.chat_service.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            let message = match message {
                Ok(message) => message,
                Err(err) => {
                    debug!(user = %user_id, error = %err, "websocket read error");
                    break;
                }
            };
            match message {
                WsMessage::Text(text) => {
                    let frame: InboundFrame = match serde_json::from_str(&text) {
                        Ok(frame) => frame,
                        Err(err) => {
                            debug!(user = %user_id, error = %err, "malformed frame, closing");
                            break;
                        }
                    };
                    if let Err(err) = chat_service.handle_frame(user_id, frame).await {
                        debug!(user = %user_id, error = %err, "unroutable frame, closing");
                        break;
                    }
                }
                WsMessage::Close(_) => break,
                WsMessage::Ping(_) | WsMessage::Pong(_) => {}
                WsMessage::Binary(_) => {
                    debug!(user = %user_id, "binary frame not supported, closing");
                    break;
                }
            }
        }
    });

    // 任何一侧结束都拆除整条连接
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!(user = %user_id, "websocket disconnected");
    // guard 在此离开作用域：注销注册表并广播在线名单。
    // 若本连接已被更新的 attach 驱逐，注销是无操作。
    drop(guard);
}

/// 读取恰好一帧握手并解析出 principal。
async fn handshake(socket: &mut WebSocket, state: &AppState) -> Result<UserId, &'static str> {
    let message = match tokio::time::timeout(HANDSHAKE_TIMEOUT, socket.recv()).await {
        Err(_) => return Err("Handshake timeout"),
        Ok(None) => return Err("Connection closed"),
        Ok(Some(Err(_))) => return Err("Connection closed"),
        Ok(Some(Ok(message))) => message,
    };

    let text = match message {
        WsMessage::Text(text) => text,
        _ => return Err("Invalid token data"),
    };

    let auth: HandshakeFrame = match serde_json::from_str(&text) {
        Ok(auth) => auth,
        Err(_) => return Err("Invalid token data"),
    };

    match state.jwt_service.verify_token(&auth.token) {
        Ok(claims) => Ok(UserId(claims.user_id)),
        Err(_) => Err("Unauthorized"),
    }
}
