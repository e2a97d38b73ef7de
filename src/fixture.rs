use crate::normalize::{RawEvent, SignInBatch, SignInStatus};

fn ev(user: &str, error_code: i64, time: &str, ip: &str) -> RawEvent {
    RawEvent {
        user_principal_name: Some(user.to_string()),
        status: Some(SignInStatus { error_code: Some(error_code) }),
        created_date_time: Some(time.to_string()),
        ip_address: Some(ip.to_string()),
    }
}

/// Hand-authored batch in the live feed shape, covering every triage path:
/// normal daytime logins, a HIGH-threshold failure burst, benign off-hours
/// activity, and one user who is both failed and off-hours.
pub fn simulated_batch() -> SignInBatch {
    SignInBatch {
        value: vec![
            // Normal logins
            ev("jsmith@lab.local", 0, "2026-02-28T09:15:00Z", "192.168.1.10"),
            ev("mjones@lab.local", 0, "2026-02-28T08:45:00Z", "192.168.1.11"),
            // Failed logins - threshold trigger
            ev("bwilliams@lab.local", 50126, "2026-02-28T10:02:00Z", "192.168.1.15"),
            ev("bwilliams@lab.local", 50126, "2026-02-28T10:03:00Z", "192.168.1.15"),
            ev("bwilliams@lab.local", 50126, "2026-02-28T10:04:00Z", "192.168.1.15"),
            ev("bwilliams@lab.local", 50126, "2026-02-28T10:05:00Z", "192.168.1.15"),
            // Off-hours logins
            ev("agreen@lab.local", 0, "2026-02-28T02:34:00Z", "192.168.1.22"),
            ev("agreen@lab.local", 0, "2026-02-28T03:12:00Z", "192.168.1.22"),
            // Both failed AND off-hours
            ev("rthomas@lab.local", 50126, "2026-02-28T23:45:00Z", "10.0.0.55"),
            ev("rthomas@lab.local", 50126, "2026-02-28T23:47:00Z", "10.0.0.55"),
            ev("rthomas@lab.local", 50126, "2026-02-28T23:51:00Z", "10.0.0.55"),
        ],
    }
}
