use crate::core::flow::FlowController;
use std::sync::Arc;
use std::time::Duration;

pub async fn run_session_reaper(controller: Arc<FlowController>, every: Duration) {
    let mut sweep_interval = tokio::time::interval(every);

    loop {
        sweep_interval.tick().await;
        log::debug!("Sweeping idle sessions...");
        let expired = controller.expire_idle().await;
        if !expired.is_empty() {
            log::info!("Expired {} idle sessions.", expired.len());
        }
    }
}

pub fn sweep_period(session_timeout: Duration) -> Duration {
    (session_timeout / 4).clamp(Duration::from_secs(5), Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_period_is_clamped() {
        assert_eq!(sweep_period(Duration::from_secs(4)), Duration::from_secs(5));
        assert_eq!(sweep_period(Duration::from_secs(120)), Duration::from_secs(30));
        assert_eq!(sweep_period(Duration::from_secs(3600)), Duration::from_secs(60));
    }
}
