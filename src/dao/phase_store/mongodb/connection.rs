use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};

/// Ping retry schedule with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Patient schedule for the first connection at startup.
    pub const STARTUP: Self = Self {
        max_attempts: 10,
        initial_delay: Duration::from_millis(250),
        max_delay: Duration::from_secs(5),
    };

    /// Short schedule for reconnects; the storage supervisor loops on its own.
    pub const RECONNECT: Self = Self {
        max_attempts: 3,
        initial_delay: Duration::from_millis(250),
        max_delay: Duration::from_secs(1),
    };

    fn next_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_delay)
    }
}

/// Build a client and wait until the server answers a ping.
pub async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
    policy: RetryPolicy,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let mut attempts = 0;
    let mut delay = policy.initial_delay;

    loop {
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => break,
            Err(err) => {
                attempts += 1;
                if attempts >= policy.max_attempts {
                    return Err(MongoDaoError::InitialPing {
                        attempts,
                        source: err,
                    });
                }
                debug!(attempts, delay_ms = delay.as_millis() as u64, "MongoDB ping failed; retrying");
                sleep(delay).await;
                delay = policy.next_delay(delay);
            }
        }
    }

    Ok((client, database))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(policy: RetryPolicy, steps: usize) -> Vec<u128> {
        let mut delay = policy.initial_delay;
        let mut seen = Vec::new();
        for _ in 0..steps {
            seen.push(delay.as_millis());
            delay = policy.next_delay(delay);
        }
        seen
    }

    #[test]
    fn startup_delay_doubles_up_to_the_cap() {
        assert_eq!(
            schedule(RetryPolicy::STARTUP, 7),
            vec![250, 500, 1000, 2000, 4000, 5000, 5000]
        );
    }

    #[test]
    fn reconnect_schedule_stays_short() {
        assert_eq!(schedule(RetryPolicy::RECONNECT, 4), vec![250, 500, 1000, 1000]);
        assert!(RetryPolicy::RECONNECT.max_attempts < RetryPolicy::STARTUP.max_attempts);
    }
}
