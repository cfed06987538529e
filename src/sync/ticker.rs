//! 固定节拍的同步循环
//!
//! 只读取翻译流水线发布的不可变快照，不做任何网络 I/O，也不等待翻译完成。

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::host::{FrameSink, LineFrame, PlaybackSource};
use super::progress::{ProgressSyncEngine, TickInput};
use super::types::SyncSnapshot;
use crate::translation::config::SyncConfig;
use crate::translation::core::engine::CancelToken;

/// 单步驱动器，负责找到当前行并喂给进度引擎
#[derive(Debug, Default)]
pub struct SyncDriver {
    engine: ProgressSyncEngine,
    last_line: Option<usize>,
    generation: Option<u64>,
}

impl SyncDriver {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            engine: ProgressSyncEngine::new(config),
            last_line: None,
            generation: None,
        }
    }

    pub fn engine(&self) -> &ProgressSyncEngine {
        &self.engine
    }

    fn finish_line(&mut self, sink: &mut dyn FrameSink) {
        if let Some(previous) = self.last_line.take() {
            sink.line_finished(previous);
        }
    }

    /// 执行一个节拍，返回渲染出的帧
    pub fn tick(
        &mut self,
        snapshot: Option<&SyncSnapshot>,
        playback: &dyn PlaybackSource,
        sink: &mut dyn FrameSink,
    ) -> Option<LineFrame> {
        // 快照属于别的曲目时视同没有快照
        let snapshot = snapshot.filter(|s| {
            match (s.track_id.as_deref(), playback.current_track_id()) {
                (Some(ours), Some(playing)) => ours == playing,
                _ => true,
            }
        });

        let Some(snapshot) = snapshot else {
            self.finish_line(sink);
            self.engine.reset();
            self.generation = None;
            return None;
        };

        if self.generation != Some(snapshot.generation) {
            self.finish_line(sink);
            self.engine.reset();
            self.generation = Some(snapshot.generation);
        }

        let playback_ms = playback.playback_ms();
        let active = playback
            .active_line()
            .filter(|&i| i < snapshot.alignment.len())
            .or_else(|| snapshot.alignment.active_line(playback_ms));

        if active != self.last_line {
            self.finish_line(sink);
            self.last_line = active;
        }

        let index = active?;
        let translated = snapshot.translations.get(index)?;
        let line = snapshot.alignment.records.get(index)?;
        let original = playback.original_signal(index);

        let frame = self.engine.tick(TickInput {
            line_index: index,
            translated,
            line,
            original: original.as_ref(),
            playback_ms,
        });
        sink.render(&frame);
        Some(frame)
    }
}

/// 后台同步循环句柄
pub struct SyncLoop {
    cancel: CancelToken,
    handle: JoinHandle<()>,
}

impl SyncLoop {
    /// 启动循环，直到 [`SyncLoop::stop`] 或快照通道关闭
    pub fn spawn<S>(
        mut snapshots: watch::Receiver<Option<Arc<SyncSnapshot>>>,
        playback: Arc<dyn PlaybackSource>,
        mut sink: S,
        config: SyncConfig,
    ) -> Self
    where
        S: FrameSink + 'static,
    {
        let cancel = CancelToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(config.tick_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let mut driver = SyncDriver::new(config);
            let mut current = snapshots.borrow_and_update().clone();
            tracing::debug!("同步循环启动");

            while !token.is_cancelled() {
                tokio::select! {
                    _ = ticker.tick() => {
                        driver.tick(current.as_deref(), playback.as_ref(), &mut sink);
                    }
                    changed = snapshots.changed() => {
                        if changed.is_err() {
                            tracing::debug!("快照通道已关闭，同步循环退出");
                            break;
                        }
                        current = snapshots.borrow_and_update().clone();
                    }
                }
            }

            tracing::debug!("同步循环结束");
        });

        Self { cancel, handle }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// 等待循环退出
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::warn!("同步循环异常退出: {}", e);
        }
    }
}
