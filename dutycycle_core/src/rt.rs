//! Real-time thread priority (Linux SCHED_FIFO behind the `rt` feature).
//!
//! Scheduler and transmission threads call this for themselves right after
//! spawning. Failure is never fatal: timing degrades, the peer keeps running.

/// Request SCHED_FIFO at `prio` for the calling thread.
///
/// The priority is clamped to the range the system reports. Returns the
/// priority actually applied.
#[cfg(all(feature = "rt", target_os = "linux"))]
pub fn raise_current_thread_priority(prio: i32) -> crate::Result<i32> {
    use libc::{
        SCHED_FIFO, pthread_self, pthread_setschedparam, sched_get_priority_max,
        sched_get_priority_min, sched_param,
    };

    let (min, max) = unsafe {
        let min = sched_get_priority_min(SCHED_FIFO);
        let max = sched_get_priority_max(SCHED_FIFO);
        if min < 0 || max < 0 {
            (1, 99)
        } else {
            (min, max)
        }
    };
    let prio_val = prio.clamp(min, max);
    let param = sched_param {
        sched_priority: prio_val,
    };
    // pthread_setschedparam returns the error code instead of setting errno.
    let rc = unsafe { pthread_setschedparam(pthread_self(), SCHED_FIFO, &param) };
    if rc != 0 {
        return Err(eyre::eyre!(
            "pthread_setschedparam(SCHED_FIFO, {prio_val}) failed: {}. \
             Needs CAP_SYS_NICE or root",
            std::io::Error::from_raw_os_error(rc)
        ));
    }
    Ok(prio_val)
}

#[cfg(not(all(feature = "rt", target_os = "linux")))]
pub fn raise_current_thread_priority(prio: i32) -> crate::Result<i32> {
    Err(crate::DutyCycleError::Config(format!(
        "thread priority {prio} not applied: built without the `rt` feature or not on Linux"
    ))
    .into())
}

/// Raise the calling thread's priority if `enabled`, logging the outcome.
pub fn apply_thread_priority(enabled: bool, prio: i32, role: &str) {
    if !enabled {
        return;
    }
    match raise_current_thread_priority(prio) {
        Ok(applied) => tracing::debug!(role, priority = applied, "thread priority raised"),
        Err(e) => tracing::warn!(role, error = %e, "running without real-time priority"),
    }
}
