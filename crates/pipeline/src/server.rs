//! 릴레이 서버
//!
//! 파이프라인 구성 요소를 소유하는 서버 컨텍스트
//!
//! [`RelayServer`]는 바인드된 리스닝 소켓, 워커 풀, 이벤트 큐, 분류기, 디스패처와
//! [`ShutdownCoordinator`]를 소유합니다. 전역 상태는 없으며, 종료는
//! [`ShutdownHandle::request`] 또는 [`RelayServer::shutdown`]으로 트리거합니다.
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), verdict_relay_pipeline::VerdictPipelineError> {
//! use verdict_relay_core::config::RelayConfig;
//! use verdict_relay_pipeline::RelayServerBuilder;
//!
//! let server = RelayServerBuilder::new()
//!     .config(RelayConfig::default())
//!     .bind()
//!     .await?;
//! let handle = server.shutdown_handle();
//! // 시그널 태스크에서 handle.request() 호출
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use verdict_relay_core::config::RelayConfig;
use verdict_relay_core::event::{AllowList, ScanVerdictEvent};
use verdict_relay_core::pipeline::{DynNotifier, Translator};

use crate::classifier::EventClassifier;
use crate::collector::{Listener, SessionContext};
use crate::dispatcher::{Dispatcher, RateWindow};
use crate::error::VerdictPipelineError;
use crate::format::MessageFormatter;
use crate::notifier::TelegramNotifier;
use crate::queue::{EventQueue, QueuePolicy};
use crate::shutdown::{ShutdownCoordinator, ShutdownHandle, ShutdownOutcome};
use crate::translate::JsonTranslator;
use crate::worker::WorkerPool;

/// 릴레이 서버 빌더
///
/// notifier나 translator를 지정하지 않으면 설정에서 Telegram notifier와
/// JSON 번역 테이블을 만듭니다.
pub struct RelayServerBuilder {
    config: RelayConfig,
    notifier: Option<Arc<dyn DynNotifier>>,
    translator: Option<Arc<dyn Translator>>,
}

impl RelayServerBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: RelayConfig::default(),
            notifier: None,
            translator: None,
        }
    }

    /// 설정을 지정합니다.
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// 알림 싱크를 지정합니다.
    pub fn notifier(mut self, notifier: Arc<dyn DynNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 번역기를 지정합니다.
    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// 구성 요소를 만들고 리스닝 소켓을 바인드합니다.
    ///
    /// 바인드 실패는 [`VerdictPipelineError::Bind`]로 반환됩니다.
    pub async fn bind(self) -> Result<RelayServer, VerdictPipelineError> {
        let config = self.config;

        let policy: QueuePolicy =
            config
                .pipeline
                .queue_policy
                .parse()
                .map_err(|reason| VerdictPipelineError::Config {
                    field: "pipeline.queue_policy".to_owned(),
                    reason,
                })?;

        let formatter =
            MessageFormatter::new(&config.dispatch.base_url, config.dispatch.utc_offset_hours)?;

        let notifier: Arc<dyn DynNotifier> = match self.notifier {
            Some(notifier) => notifier,
            None => Arc::new(TelegramNotifier::new(&config.telegram)?),
        };

        let translator: Arc<dyn Translator> = match self.translator {
            Some(translator) => translator,
            None if config.dispatch.translations_dir.is_empty() => {
                Arc::new(JsonTranslator::empty())
            }
            None => Arc::new(JsonTranslator::load_dir(&config.dispatch.translations_dir).await?),
        };

        let allow_list = AllowList::from_mode(&config.filter.mode);
        let classifier = Arc::new(EventClassifier::new(
            config.filter.marker.clone(),
            allow_list,
        ));
        info!(
            mode = config.filter.mode.as_str(),
            levels = ?classifier.allow_list().levels(),
            marker = classifier.marker(),
            "severity filter configured"
        );

        let socket = TcpListener::bind(&config.listener.bind)
            .await
            .map_err(|e| VerdictPipelineError::Bind {
                addr: config.listener.bind.clone(),
                reason: e.to_string(),
            })?;
        let local_addr = socket.local_addr()?;
        let socket = Arc::new(socket);
        info!(addr = %local_addr, "listening socket bound");

        let pool = Arc::new(WorkerPool::new(config.pipeline.worker_threads));
        let queue: Arc<EventQueue<ScanVerdictEvent>> =
            Arc::new(EventQueue::new(config.pipeline.queue_capacity, policy));
        info!(
            capacity = queue.capacity(),
            policy = queue.policy().as_str(),
            "event queue ready"
        );
        let tasks = TaskTracker::new();
        let cancel = CancellationToken::new();

        let ctx = Arc::new(SessionContext {
            classifier,
            pool: Arc::clone(&pool),
            queue: Arc::clone(&queue),
            max_session_bytes: config.listener.max_session_bytes,
        });

        let listener = Listener::new(
            Arc::clone(&socket),
            ctx,
            tasks.clone(),
            cancel.clone(),
            config.listener.max_connections,
        );

        let dispatcher = Dispatcher::new(
            Arc::clone(&queue),
            notifier,
            translator,
            formatter,
            RateWindow::per_minute(config.dispatch.messages_per_minute),
            cancel.clone(),
        );

        let coordinator = ShutdownCoordinator::new(cancel, tasks.clone(), pool, Arc::clone(&queue))
            .with_listener(socket);

        Ok(RelayServer {
            local_addr,
            pending: Some((listener, dispatcher)),
            tasks,
            queue,
            coordinator,
        })
    }
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 릴레이 서버 컨텍스트
pub struct RelayServer {
    local_addr: SocketAddr,
    pending: Option<(Listener, Dispatcher)>,
    tasks: TaskTracker,
    queue: Arc<EventQueue<ScanVerdictEvent>>,
    coordinator: ShutdownCoordinator,
}

impl RelayServer {
    /// 실제 바인드된 주소 (포트 0으로 바인드한 경우 확인용)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 종료 요청 핸들
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.coordinator.handle()
    }

    /// 이벤트 큐
    pub fn queue(&self) -> &Arc<EventQueue<ScanVerdictEvent>> {
        &self.queue
    }

    /// 리스너와 디스패처 태스크를 시작합니다.
    pub fn start(&mut self) -> Result<(), VerdictPipelineError> {
        let (listener, dispatcher) = self
            .pending
            .take()
            .ok_or(VerdictPipelineError::AlreadyRunning)?;

        self.tasks.spawn(listener.run());
        self.tasks.spawn(async move {
            dispatcher.run().await;
        });
        info!(addr = %self.local_addr, "relay server started");
        Ok(())
    }

    /// 종료 시퀀스를 실행합니다. 여러 번 호출해도 한 번만 수행됩니다.
    pub async fn shutdown(&mut self) -> ShutdownOutcome {
        // 시작하지 않은 구성 요소가 소켓을 붙잡고 있지 않도록 먼저 해제
        self.pending.take();
        self.coordinator.shutdown().await
    }

    /// 서버를 시작하고 종료 요청이 들어올 때까지 실행합니다.
    pub async fn run(mut self) -> Result<ShutdownOutcome, VerdictPipelineError> {
        if self.pending.is_some() {
            self.start()?;
        }
        self.coordinator.wait_requested().await;
        Ok(self.shutdown().await)
    }
}
