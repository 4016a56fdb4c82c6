// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Transfer process managers.
//!
//! [`TransferManager`] is the front door: it routes each request to the
//! synchronous or asynchronous manager based on the request's `is_sync` flag
//! and owns the background lifecycle of the asynchronous manager. The two
//! delegates can also be used directly.

pub mod async_manager;
pub mod sync_manager;

pub use self::async_manager::{AsyncTransferManager, AsyncTransferManagerBuilder};
pub use self::sync_manager::SyncTransferManager;

use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::dispatch::RemoteMessageDispatcher;
use crate::error::TransferError;
use crate::listener::ListenerRegistry;
use crate::provision::ProvisionManager;
use crate::proxy::{NoProxyResolver, ProxyResolver};
use crate::retry::SendRetryPolicy;
use crate::status::StatusCheckerRegistry;
use crate::store::TransferProcessStore;
use crate::types::{DataRequest, InitiateResponse};
use crate::wait::WaitStrategy;

/// Routes transfer requests to the synchronous or asynchronous manager.
///
/// Holds no state of its own beyond the two delegates. `start`/`stop` apply
/// only to the asynchronous manager; the synchronous manager has no
/// background lifecycle.
pub struct TransferManager {
    asynchronous: Arc<AsyncTransferManager>,
    synchronous: SyncTransferManager,
}

impl std::fmt::Debug for TransferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferManager").finish_non_exhaustive()
    }
}

impl TransferManager {
    /// Create a new builder for configuring the manager.
    pub fn builder() -> TransferManagerBuilder {
        TransferManagerBuilder::new()
    }

    /// Initiate a consumer-side transfer, routed on the request's
    /// `is_sync` flag.
    pub async fn initiate_consumer_request(
        &self,
        request: DataRequest,
    ) -> Result<InitiateResponse, TransferError> {
        if request.is_sync {
            self.synchronous.initiate_consumer_request(request).await
        } else {
            let process_id = self.asynchronous.initiate_consumer_request(request).await?;
            Ok(InitiateResponse::ok(process_id, None))
        }
    }

    /// Initiate a provider-side transfer, routed on the request's
    /// `is_sync` flag.
    pub async fn initiate_provider_request(
        &self,
        request: DataRequest,
    ) -> Result<InitiateResponse, TransferError> {
        if request.is_sync {
            self.synchronous.initiate_provider_request(request).await
        } else {
            let process_id = self.asynchronous.initiate_provider_request(request).await?;
            Ok(InitiateResponse::ok(process_id, None))
        }
    }

    /// Trigger resource teardown for a `COMPLETED` asynchronous process.
    pub async fn deprovision(&self, process_id: &str) -> Result<(), TransferError> {
        self.asynchronous.deprovision(process_id).await
    }

    /// Start the asynchronous manager's background worker.
    pub async fn start(&self) {
        self.asynchronous.start().await;
    }

    /// Stop the asynchronous manager's background worker.
    pub async fn stop(&self) {
        self.asynchronous.stop().await;
    }

    /// The listener registry notified on terminal transitions.
    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        self.asynchronous.listeners()
    }

    /// The status checker registry consulted during completion checks.
    pub fn status_checkers(&self) -> &Arc<StatusCheckerRegistry> {
        self.asynchronous.status_checkers()
    }

    /// The asynchronous delegate.
    pub fn asynchronous(&self) -> &Arc<AsyncTransferManager> {
        &self.asynchronous
    }
}

/// Builder for creating a [`TransferManager`].
pub struct TransferManagerBuilder {
    store: Option<Arc<dyn TransferProcessStore>>,
    provision_manager: Option<Arc<dyn ProvisionManager>>,
    dispatcher: Option<Arc<dyn RemoteMessageDispatcher>>,
    proxy_resolver: Option<Arc<dyn ProxyResolver>>,
    status_checkers: Option<Arc<StatusCheckerRegistry>>,
    listeners: Option<Arc<ListenerRegistry>>,
    retry_policy: Option<SendRetryPolicy>,
    wait_strategy: Option<Box<dyn WaitStrategy>>,
    config: Config,
}

impl std::fmt::Debug for TransferManagerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferManagerBuilder")
            .field("store", &self.store.as_ref().map(|_| "..."))
            .field(
                "provision_manager",
                &self.provision_manager.as_ref().map(|_| "..."),
            )
            .field("dispatcher", &self.dispatcher.as_ref().map(|_| "..."))
            .field("config", &self.config)
            .finish()
    }
}

impl Default for TransferManagerBuilder {
    fn default() -> Self {
        Self {
            store: None,
            provision_manager: None,
            dispatcher: None,
            proxy_resolver: None,
            status_checkers: None,
            listeners: None,
            retry_policy: None,
            wait_strategy: None,
            config: Config::default(),
        }
    }
}

impl TransferManagerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the process store (required).
    pub fn store(mut self, store: Arc<dyn TransferProcessStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the provision manager (required).
    pub fn provision_manager(mut self, provision_manager: Arc<dyn ProvisionManager>) -> Self {
        self.provision_manager = Some(provision_manager);
        self
    }

    /// Set the remote dispatcher (required).
    pub fn dispatcher(mut self, dispatcher: Arc<dyn RemoteMessageDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Set the proxy resolver for the synchronous provider path.
    /// Defaults to [`NoProxyResolver`].
    pub fn proxy_resolver(mut self, proxy_resolver: Arc<dyn ProxyResolver>) -> Self {
        self.proxy_resolver = Some(proxy_resolver);
        self
    }

    /// Set the status checker registry. Defaults to an empty registry.
    pub fn status_checkers(mut self, status_checkers: Arc<StatusCheckerRegistry>) -> Self {
        self.status_checkers = Some(status_checkers);
        self
    }

    /// Set the listener registry. Defaults to an empty registry.
    pub fn listeners(mut self, listeners: Arc<ListenerRegistry>) -> Self {
        self.listeners = Some(listeners);
        self
    }

    /// Set the send retry policy. Defaults to one derived from the config.
    pub fn retry_policy(mut self, retry_policy: SendRetryPolicy) -> Self {
        self.retry_policy = Some(retry_policy);
        self
    }

    /// Set the idle wait strategy. Defaults to one derived from the config.
    pub fn wait_strategy(mut self, wait_strategy: Box<dyn WaitStrategy>) -> Self {
        self.wait_strategy = Some(wait_strategy);
        self
    }

    /// Set the configuration. Defaults to [`Config::default`].
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Build the manager.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<TransferManager> {
        let store = self.store.ok_or_else(|| anyhow::anyhow!("store is required"))?;
        let provision_manager = self
            .provision_manager
            .ok_or_else(|| anyhow::anyhow!("provision manager is required"))?;
        let dispatcher = self
            .dispatcher
            .ok_or_else(|| anyhow::anyhow!("dispatcher is required"))?;

        let config = self.config;
        let retry_policy = self.retry_policy.unwrap_or_else(|| {
            SendRetryPolicy::new(
                config.send_retry_limit,
                Box::new(crate::retry::ExponentialRetryDelay::new(
                    config.send_retry_base_delay_ms,
                )),
            )
        });
        let wait_strategy = self.wait_strategy.unwrap_or_else(|| {
            Box::new(crate::wait::ExponentialWaitStrategy::new(
                config.poll_delay_ms,
                config.poll_delay_cap_ms,
            ))
        });

        let asynchronous = AsyncTransferManager::builder()
            .store(store.clone())
            .provision_manager(provision_manager)
            .dispatcher(dispatcher.clone())
            .status_checkers(
                self.status_checkers
                    .unwrap_or_else(|| Arc::new(StatusCheckerRegistry::new())),
            )
            .listeners(
                self.listeners
                    .unwrap_or_else(|| Arc::new(ListenerRegistry::new())),
            )
            .retry_policy(retry_policy)
            .wait_strategy(wait_strategy)
            .batch_size(config.batch_size)
            .build()?;

        let synchronous = SyncTransferManager::new(
            store,
            dispatcher,
            self.proxy_resolver
                .unwrap_or_else(|| Arc::new(NoProxyResolver)),
            config.sync_request_timeout,
        );

        Ok(TransferManager {
            asynchronous: Arc::new(asynchronous),
            synchronous,
        })
    }
}
