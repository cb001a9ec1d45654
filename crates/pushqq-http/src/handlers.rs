use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MsgRequest {
    /// "qq" for a private message, "group" for a group message.
    #[serde(default)]
    pub method: String,
    /// QQ number or group number, as a decimal string.
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MsgResponse {
    pub status: &'static str,
    pub msg: String,
}

impl MsgResponse {
    fn success(msg: impl Into<String>) -> Self {
        Self {
            status: "success",
            msg: msg.into(),
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error",
            msg: msg.into(),
        }
    }
}

pub async fn root() -> &'static str {
    "Hello, World!"
}

/// `POST /api/msg`: validate the body, then relay it through the gateway.
///
/// Always answers 200 with a `{status, msg}` payload; validation failures and
/// send failures differ only in the message. The body is parsed by hand so a
/// malformed request gets the same structured error instead of a framework
/// rejection.
pub async fn post_msg(State(state): State<AppState>, body: Bytes) -> Json<MsgResponse> {
    let Ok(input) = serde_json::from_slice::<MsgRequest>(&body) else {
        return Json(MsgResponse::error("数据请求错误"));
    };
    if input.msg.is_empty() {
        return Json(MsgResponse::error("数据请求错误"));
    }

    let Some(gateway) = state.gateway.as_ref() else {
        return Json(MsgResponse::error("QQ客户端未初始化"));
    };

    let response = match input.method.as_str() {
        "qq" => match input.uid.parse::<u64>() {
            Err(_) => MsgResponse::error("QQ号格式错误"),
            Ok(uin) => match gateway.send_private(uin, &input.msg).await {
                Ok(receipt) => {
                    debug!("private message to {uin} accepted at {}", receipt.time);
                    MsgResponse::success("消息发送成功")
                }
                Err(e) => MsgResponse::error(format!("发送私聊消息失败: {e}")),
            },
        },
        "group" => match input.uid.parse::<u64>() {
            Err(_) => MsgResponse::error("群号格式错误"),
            Ok(uin) => match gateway.send_group(uin, &input.msg).await {
                Ok(receipt) => {
                    debug!("group message to {uin} accepted at {}", receipt.time);
                    MsgResponse::success("消息发送成功")
                }
                Err(e) => MsgResponse::error(format!("发送群消息失败: {e}")),
            },
        },
        _ => MsgResponse::error("未知方法"),
    };

    Json(response)
}
