use async_trait::async_trait;

use crate::{models::Message, ConsumerResult};

/// 消息处理函数：`(Context, Message) -> ()`
///
/// 任意 `FnMut(&mut C, Message) -> ConsumerResult<()>` 闭包都自动实现该接口；
/// 需要在处理过程中等待异步操作时，为自定义类型实现它。
#[async_trait]
pub trait MessageHandler<C: Send>: Send {
    async fn handle(&mut self, context: &mut C, message: Message) -> ConsumerResult<()>;
}

#[async_trait]
impl<C, F> MessageHandler<C> for F
where
    C: Send,
    F: FnMut(&mut C, Message) -> ConsumerResult<()> + Send,
{
    async fn handle(&mut self, context: &mut C, message: Message) -> ConsumerResult<()> {
        (*self)(context, message)
    }
}
