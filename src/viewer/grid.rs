//! Grid of viewers, one per camera

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};
use typeshare::typeshare;

use super::component::{ErrorHandler, ViewerComponent};
use super::ViewerContext;
use crate::error::StreamError;
use crate::registry::Camera;
use crate::webrtc::session::Connectivity;
use crate::webrtc::target::StreamTarget;

/// Status of one grid cell
#[typeshare]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewerStatus {
    pub camera_id: String,
    pub state: Connectivity,
    /// Overlay text shown on the cell
    pub status_text: String,
    /// Last error reported for this camera
    pub last_error: Option<String>,
}

/// What a `sync` changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridChanges {
    pub mounted: Vec<String>,
    pub unmounted: Vec<String>,
    pub remounted: Vec<String>,
}

impl GridChanges {
    pub fn is_empty(&self) -> bool {
        self.mounted.is_empty() && self.unmounted.is_empty() && self.remounted.is_empty()
    }
}

/// One viewer per camera ID
pub struct ViewerGrid {
    ctx: ViewerContext,
    gateway_base_url: String,
    viewers: BTreeMap<String, ViewerComponent>,
    errors: Arc<Mutex<HashMap<String, String>>>,
}

impl ViewerGrid {
    pub fn new(ctx: ViewerContext, gateway_base_url: impl Into<String>) -> Self {
        Self {
            ctx,
            gateway_base_url: gateway_base_url.into(),
            viewers: BTreeMap::new(),
            errors: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Sync against registry cameras
    pub fn sync(&mut self, cameras: &[Camera]) -> GridChanges {
        let targets = cameras
            .iter()
            .map(|camera| camera.stream_target(&self.gateway_base_url))
            .collect();
        self.sync_targets(targets)
    }

    /// Sync against explicit targets
    ///
    /// New camera IDs are mounted, missing ones unmounted. Targets are
    /// immutable, so a changed gateway URL means a remount.
    pub fn sync_targets(&mut self, targets: Vec<StreamTarget>) -> GridChanges {
        let mut changes = GridChanges::default();
        let wanted: BTreeMap<String, StreamTarget> = targets
            .into_iter()
            .map(|t| (t.camera_id.clone(), t))
            .collect();

        let removed: Vec<String> = self
            .viewers
            .keys()
            .filter(|id| !wanted.contains_key(*id))
            .cloned()
            .collect();
        for id in removed {
            self.unmount(&id);
            changes.unmounted.push(id);
        }

        for (id, target) in wanted {
            match self.viewers.get(&id) {
                Some(viewer) if viewer.target() == &target => {}
                Some(_) => {
                    self.unmount(&id);
                    self.mount(target);
                    changes.remounted.push(id);
                }
                None => {
                    self.mount(target);
                    changes.mounted.push(id);
                }
            }
        }

        if !changes.is_empty() {
            info!(
                "Viewer grid synced: {} mounted, {} unmounted, {} remounted",
                changes.mounted.len(),
                changes.unmounted.len(),
                changes.remounted.len()
            );
        }
        changes
    }

    fn mount(&mut self, target: StreamTarget) {
        let errors = self.errors.clone();
        let on_error: ErrorHandler = Arc::new(move |target: &StreamTarget, err: &StreamError| {
            errors
                .lock()
                .insert(target.camera_id.clone(), err.to_string());
        });

        let id = target.camera_id.clone();
        let viewer = ViewerComponent::mount(target, &self.ctx, Some(on_error));
        self.viewers.insert(id, viewer);
    }

    /// Unmount one camera; returns whether it was mounted
    pub fn unmount(&mut self, camera_id: &str) -> bool {
        let Some(mut viewer) = self.viewers.remove(camera_id) else {
            return false;
        };
        viewer.unmount();
        self.errors.lock().remove(camera_id);
        true
    }

    /// Replace a camera's viewer with a fresh one (user retry)
    pub fn remount(&mut self, camera_id: &str) -> bool {
        let Some(target) = self.viewers.get(camera_id).map(|v| v.target().clone()) else {
            return false;
        };
        debug!("Remounting viewer {}", camera_id);
        self.unmount(camera_id);
        self.mount(target);
        true
    }

    pub fn unmount_all(&mut self) {
        let ids: Vec<String> = self.viewers.keys().cloned().collect();
        for id in ids {
            self.unmount(&id);
        }
    }

    pub fn viewer(&self, camera_id: &str) -> Option<&ViewerComponent> {
        self.viewers.get(camera_id)
    }

    pub fn viewers(&self) -> impl Iterator<Item = &ViewerComponent> {
        self.viewers.values()
    }

    pub fn last_error(&self, camera_id: &str) -> Option<String> {
        self.errors.lock().get(camera_id).cloned()
    }

    pub fn statuses(&self) -> Vec<ViewerStatus> {
        let errors = self.errors.lock();
        self.viewers
            .iter()
            .map(|(id, viewer)| {
                let observation = viewer.observation();
                ViewerStatus {
                    camera_id: id.clone(),
                    state: observation.state,
                    status_text: observation.status_text(),
                    last_error: errors.get(id).cloned(),
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.viewers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerConfig;
    use crate::events::EventBus;
    use crate::render::{DisplaySurface, StatsSurface};
    use crate::webrtc::controller::testing::{FakeFactory, FakeSignaling, Reply};
    use crate::webrtc::session::SessionState;
    use std::time::Duration;

    fn grid(reply: Reply) -> (ViewerGrid, Arc<FakeFactory>) {
        let factory = Arc::new(FakeFactory::default());
        let ctx = ViewerContext {
            viewer: ViewerConfig::default(),
            factory: factory.clone(),
            signaling: Arc::new(FakeSignaling::always(reply)),
            events: Arc::new(EventBus::new()),
            surfaces: Arc::new(|_: &StreamTarget| {
                Arc::new(StatsSurface::new()) as Arc<dyn DisplaySurface>
            }),
        };
        (ViewerGrid::new(ctx, "http://gateway:8889"), factory)
    }

    fn target(id: &str, url: &str) -> StreamTarget {
        StreamTarget::new(id, url)
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_mounts_unmounts_and_remounts() {
        let (mut grid, _factory) = grid(Reply::Answer);

        let changes = grid.sync_targets(vec![
            target("a", "http://gw/a"),
            target("b", "http://gw/b"),
        ]);
        assert_eq!(changes.mounted, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(grid.len(), 2);

        let changes = grid.sync_targets(vec![
            target("a", "http://gw/a"),
            target("b", "http://other/b"),
            target("c", "http://gw/c"),
        ]);
        assert_eq!(changes.mounted, vec!["c".to_string()]);
        assert_eq!(changes.remounted, vec!["b".to_string()]);
        assert!(changes.unmounted.is_empty());
        assert_eq!(grid.viewer("b").unwrap().target().gateway_url, "http://other/b");

        let changes = grid.sync_targets(vec![target("c", "http://gw/c")]);
        assert_eq!(changes.unmounted, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(grid.len(), 1);

        assert!(grid.sync_targets(vec![target("c", "http://gw/c")]).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_recorded_per_camera() {
        let (mut grid, _factory) = grid(Reply::Reject(401));
        grid.sync_targets(vec![target("a", "http://gw/a")]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let error = grid.last_error("a").unwrap();
        assert!(error.contains("HTTP 401"));

        let statuses = grid.statuses();
        assert_eq!(statuses[0].state, Connectivity::Failed);
        assert_eq!(statuses[0].last_error.as_deref(), Some(error.as_str()));

        assert!(grid.remount("a"));
        assert!(grid.last_error("a").is_none());
        assert!(!grid.remount("missing"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_all() {
        let (mut grid, factory) = grid(Reply::Answer);
        grid.sync_targets(vec![target("a", "http://gw/a"), target("b", "http://gw/b")]);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(grid
            .viewers()
            .all(|v| v.state() == SessionState::Connected));

        grid.unmount_all();
        assert!(grid.is_empty());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(factory.open_count(), 2);
        assert!((0..2).all(|i| factory
            .transport(i)
            .closed
            .load(std::sync::atomic::Ordering::SeqCst)));
    }
}
