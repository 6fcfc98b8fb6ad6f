//! # 数据模型
//!
//! 消息分发循环处理的核心数据结构。
//!
//! ## 核心模型
//!
//! ### SubscriptionTag - 订阅标签
//! 消息代理在注册消费者时返回的标识，后续每次接收都通过它关联到同一个订阅。
//!
//! ### Envelope - 投递信封
//! 代理投递的一条消息及其元数据（投递序号、交换机、路由键、是否重投）。
//!
//! ### Message - 消息
//! 从信封中提取出的文本负载，只在一次处理函数调用期间存在。
//! 所有队列都使用 YAML 作为消息体格式，[`Message::decode`] 按 YAML 解码。
//!
//! ## 生命周期
//!
//! ```text
//! broker ──receive──▶ Envelope ──message()──▶ Message ──▶ handler(context, message)
//! ```

pub mod envelope;
pub mod message;

pub use envelope::*;
pub use message::*;
