use tokio::sync::oneshot;
use tracing::warn;

use evlog_protocol::{MethodCall, MethodError, Value};
use evlog_types::ObjectPath;

/// Outcome of one method call, as delivered to the caller.
pub type CallResult = Result<Vec<Value>, MethodError>;

/// A call queued for the bus owner, with the channel its reply goes back on.
pub(crate) struct IncomingCall {
    pub(crate) call: MethodCall,
    pub(crate) reply: oneshot::Sender<CallResult>,
}

/// One object reported by `GetManagedObjects`: its path and the bindings
/// of every interface registered on it.
#[derive(Clone, Debug)]
pub struct ManagedObject<B> {
    pub path: ObjectPath,
    pub interfaces: Vec<(String, B)>,
}

/// A resolved request the bus owner has to answer.
#[derive(Debug)]
pub enum Request<B> {
    /// A method on a registered interface.
    Method {
        binding: B,
        interface: String,
        member: String,
        args: Vec<Value>,
    },
    /// `org.freedesktop.DBus.Properties.Get`.
    GetProperty {
        binding: B,
        interface: String,
        property: String,
    },
    /// `org.freedesktop.DBus.Properties.GetAll`.
    GetAllProperties { binding: B, interface: String },
    /// `org.freedesktop.DBus.ObjectManager.GetManagedObjects`.
    ManagedObjects { objects: Vec<ManagedObject<B>> },
}

/// Sends the single reply to a dispatched call.
///
/// Dropping a responder without answering replies with a `Failed` error,
/// so a caller is never left waiting.
pub struct Responder {
    reply: Option<oneshot::Sender<CallResult>>,
    member: String,
}

impl Responder {
    pub(crate) fn new(reply: oneshot::Sender<CallResult>, member: String) -> Self {
        Self {
            reply: Some(reply),
            member,
        }
    }

    pub fn send(mut self, result: CallResult) {
        self.deliver(result);
    }

    fn deliver(&mut self, result: CallResult) {
        if let Some(reply) = self.reply.take() {
            // The caller may have gone away; nothing is waiting for the reply then.
            let _ = reply.send(result);
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if self.reply.is_some() {
            warn!(member = %self.member, "call dropped without a reply");
            let message = format!("{} produced no reply", self.member);
            self.deliver(Err(MethodError::failed(message)));
        }
    }
}

/// A call resolved against the object table, ready for the owner.
pub struct Dispatch<B> {
    pub path: ObjectPath,
    pub request: Request<B>,
    pub responder: Responder,
}

impl<B> Dispatch<B> {
    /// Answer the call.
    pub fn reply(self, result: CallResult) {
        self.responder.send(result);
    }
}
