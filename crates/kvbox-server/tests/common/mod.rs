// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for kvbox-server integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use kvbox_server::config::Config;
use kvbox_server::lifecycle::LifecycleState;
use tokio::sync::watch;

/// Skip test if the test database URL is not set
macro_rules! skip_if_no_db {
    () => {
        if std::env::var("TEST_KVBOX_DATABASE_URL").is_err() {
            eprintln!("Skipping test: TEST_KVBOX_DATABASE_URL not set");
            return;
        }
    };
}

/// Database URL for PostgreSQL tests.
pub fn test_database_url() -> Option<String> {
    std::env::var("TEST_KVBOX_DATABASE_URL").ok()
}

/// Find an available local port.
pub fn free_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Config listening on `addr` with a short operations timeout.
pub fn test_config(addr: SocketAddr) -> Config {
    Config {
        http_addr: addr,
        database_url: test_database_url(),
        operations_timeout: Duration::from_secs(5),
        ..Config::default()
    }
}

/// Wait until the lifecycle reports it is serving and the listener accepts.
pub async fn wait_until_serving(states: &mut watch::Receiver<LifecycleState>, addr: SocketAddr) {
    tokio::time::timeout(
        Duration::from_secs(10),
        states.wait_for(|state| *state == LifecycleState::Serving),
    )
    .await
    .expect("lifecycle never reached Serving")
    .expect("lifecycle dropped");

    let mut attempts = 0;
    while tokio::net::TcpStream::connect(addr).await.is_err() {
        attempts += 1;
        assert!(attempts < 100, "listener never accepted on {}", addr);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
