use crate::replicated_log::LogRole;
use tokio::sync::watch;

pub(crate) fn new(initial_role: LogRole) -> (LogRoleNotifier, LogRoleListener) {
    let (snd, rcv) = watch::channel(initial_role);

    (LogRoleNotifier { snd }, LogRoleListener { rcv })
}

pub(crate) struct LogRoleNotifier {
    snd: watch::Sender<LogRole>,
}

impl LogRoleNotifier {
    pub(crate) fn notify_new_role(&self, new_role: LogRole) {
        let _ = self.snd.send(new_role);
    }
}

/// LogRoleListener observes role changes of one participant. Like a watch channel, it doesn't
/// queue intermediate roles: if several changes happen between two calls to `next()`, only the
/// most recent one is observed.
#[derive(Clone)]
pub struct LogRoleListener {
    rcv: watch::Receiver<LogRole>,
}

impl LogRoleListener {
    pub fn current(&self) -> LogRole {
        self.rcv.borrow().clone()
    }

    /// next waits for the role to change and returns the new role. `None` means the log is gone.
    pub async fn next(&mut self) -> Option<LogRole> {
        match self.rcv.changed().await {
            Ok(_) => Some(self.rcv.borrow().clone()),
            Err(_) => None,
        }
    }
}
