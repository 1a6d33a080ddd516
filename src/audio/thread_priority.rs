// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Priority for the render thread when SOUNDBUS_THREAD_PRIORITY is unset.
const DEFAULT_RENDER_THREAD_PRIORITY: u8 = 70;

/// Scheduling settings for the render thread, read once before the stream is
/// built so the callback never touches the environment.
#[derive(Debug, Clone, Copy)]
pub struct RenderPriority {
    priority: Option<ThreadPriorityValue>,
    realtime: bool,
    applied: bool,
}

impl RenderPriority {
    /// Reads SOUNDBUS_THREAD_PRIORITY (0-99) and SOUNDBUS_DISABLE_RT_AUDIO.
    pub fn from_env() -> RenderPriority {
        RenderPriority {
            priority: parse_priority(std::env::var("SOUNDBUS_THREAD_PRIORITY").ok().as_deref()),
            realtime: !env_flag(std::env::var("SOUNDBUS_DISABLE_RT_AUDIO").ok().as_deref()),
            applied: false,
        }
    }

    /// Raises the priority of the calling thread. Only the first call does
    /// anything; later calls return immediately.
    pub fn apply(&mut self) {
        if self.applied {
            return;
        }
        self.applied = true;

        let Some(priority) = self.priority else {
            return;
        };
        let tp = ThreadPriority::Crossplatform(priority);
        if let Err(e) = set_current_thread_priority(tp) {
            warn!(err = ?e, "Unable to raise render thread priority");
        }

        #[cfg(unix)]
        if self.realtime {
            use thread_priority::unix::{
                set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
                ThreadSchedulePolicy,
            };
            match set_thread_priority_and_policy(
                thread_native_id(),
                tp,
                ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
            ) {
                Ok(()) => info!("Enabled SCHED_FIFO for render thread"),
                Err(e) => warn!(err = %e, "Failed to set SCHED_FIFO for render thread"),
            }
        }
    }
}

/// Parses a priority in 0-99, falling back to the default for anything else.
fn parse_priority(value: Option<&str>) -> Option<ThreadPriorityValue> {
    let requested = value
        .and_then(|v| v.trim().parse::<u8>().ok())
        .filter(|n| *n < 100)
        .unwrap_or(DEFAULT_RENDER_THREAD_PRIORITY);
    ThreadPriorityValue::try_from(requested).ok()
}

fn env_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        v == "1"
            || v.eq_ignore_ascii_case("true")
            || v.eq_ignore_ascii_case("yes")
            || v.eq_ignore_ascii_case("on")
    })
}
