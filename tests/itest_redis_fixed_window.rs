#![cfg(feature = "redis-tokio")]

use std::{env, thread, time::Duration};

use tallyguard::{
    LimitConfig, LimitGroup, LimiterSettings, Outcome, RateLimiter, TallyguardError,
};

fn redis_url() -> Option<String> {
    env::var("REDIS_URL").ok()
}

fn settings(url: &str) -> LimiterSettings {
    let n: u64 = rand::random();

    LimiterSettings {
        store_uri: url.to_string(),
        prefix: format!("tallyguard_itest_{n}"),
        connection_count: 2,
        ..LimiterSettings::default()
    }
}

#[test]
fn rejects_at_exact_window_limit() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let rl = RateLimiter::connect(&settings(&url)).await.unwrap();
        let l = rl
            .limiter("api", "k", LimitConfig::new(3, 60).unwrap(), "fixed_window")
            .unwrap();

        for _ in 0..3 {
            assert!(l.increment().await.unwrap().allowed);
        }

        let d = l.increment().await.unwrap();
        assert!(!d.allowed);
        assert_eq!(d.current_count, 4);
        assert_eq!(l.remaining().await.unwrap(), 0);

        l.reset().await.unwrap();
        assert_eq!(l.count().await.unwrap(), 0);
    });
}

#[test]
fn per_identifier_state_is_independent() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let rl = RateLimiter::connect(&settings(&url)).await.unwrap();
        let config = LimitConfig::new(1, 60).unwrap();

        let a = rl.limiter("api", "a", config, "fixed_window").unwrap();
        let b = rl.limiter("api", "b", config, "fixed_window").unwrap();

        assert!(a.increment().await.unwrap().allowed);
        assert!(!a.increment().await.unwrap().allowed);
        assert!(b.increment().await.unwrap().allowed);

        a.reset().await.unwrap();
        b.reset().await.unwrap();
    });
}

#[test]
fn unblocks_after_window_expires() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let rl = RateLimiter::connect(&settings(&url)).await.unwrap();
        let l = rl
            .limiter("api", "k", LimitConfig::new(2, 1).unwrap(), "fixed_window")
            .unwrap();

        l.increment().await.unwrap();
        l.increment().await.unwrap();
        assert!(matches!(l.try_increment().await.unwrap(), Outcome::Denied(_)));

        thread::sleep(Duration::from_millis(1_100));

        assert!(matches!(
            l.try_increment().await.unwrap(),
            Outcome::Admitted(_)
        ));
    });
}

#[test]
fn strict_increment_and_group_over_redis() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let rl = RateLimiter::connect(&settings(&url)).await.unwrap();
        let minute = rl
            .limiter("login", "u", LimitConfig::new(5, 60).unwrap(), "fixed_window")
            .unwrap();
        let burst = rl
            .limiter("login_burst", "u", LimitConfig::new(1, 60).unwrap(), "sliding")
            .unwrap();

        assert!(burst.increment_strict().await.unwrap().allowed);
        assert!(matches!(
            burst.increment_strict().await,
            Err(TallyguardError::LimitExceeded { max: 1, .. })
        ));

        let group = LimitGroup::new(vec![minute.clone(), burst.clone()]);
        let decision = group.increment().await.unwrap();
        assert_eq!(decision.denied_by, Some(1));
        assert_eq!(minute.count().await.unwrap(), 0);

        group.reset().await.unwrap();
    });
}

#[test]
fn unreachable_store_fails_to_connect() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let settings = LimiterSettings {
            store_uri: "redis://127.0.0.1:1/".to_string(),
            ..LimiterSettings::default()
        };

        let err = RateLimiter::connect(&settings).await.unwrap_err();
        assert!(err.is_store_error(), "{err:?}");
    });
}
