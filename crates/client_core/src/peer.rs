//! Maps events relayed from other clients onto local transitions.

use shared::protocol::PeerEvent;

use crate::state::{ProjectsState, Transition};

/// Returns the transition a peer event implies for `state`, or `None` when
/// the event concerns a project other than the one currently open.
pub fn peer_transition(state: &ProjectsState, event: PeerEvent) -> Option<Transition> {
    let active = state.active_project.as_ref()?;
    if event.task().project_id() != Some(&active.id) {
        return None;
    }

    let transition = match event {
        PeerEvent::TaskAdded(task) => {
            let known = active
                .tasks
                .as_ref()
                .is_some_and(|tasks| tasks.iter().any(|t| t.id == task.id));
            if known {
                Transition::ReplaceTaskById(task)
            } else {
                Transition::AppendTask(task)
            }
        }
        PeerEvent::TaskUpdated(task) | PeerEvent::TaskStatusChanged(task) => {
            Transition::ReplaceTaskById(task)
        }
        PeerEvent::TaskDeleted(task) => Transition::RemoveTaskById(task.id),
    };
    Some(transition)
}
