//! Owns every open viewer and its stream connection.
//!
//! Calls naming an instance that is not open are no-ops: they return
//! `false` or `None` so a host holding a stale id after teardown stays safe.

use crate::config::ViewerConfig;
use crate::deep_link::DeepLink;
use crate::stream::{ConnectionManager, ConnectionSnapshot, StreamEvent, Transport};
use crate::viewer::LogViewer;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn for_job(job_id: &str) -> Self {
        Self(format!("job-logs-{job_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct Instance {
    viewer: LogViewer,
    events: UnboundedReceiver<StreamEvent>,
}

impl Instance {
    fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            self.viewer.apply(event);
            applied += 1;
        }
        applied
    }
}

pub struct Coordinator<T: Transport> {
    connections: ConnectionManager<T>,
    instances: BTreeMap<InstanceId, Instance>,
    config: ViewerConfig,
}

impl<T: Transport> Coordinator<T> {
    pub fn new(transport: T, runtime: Handle, config: ViewerConfig) -> Self {
        Self {
            connections: ConnectionManager::new(transport, runtime, config.stream_settings()),
            instances: BTreeMap::new(),
            config,
        }
    }

    /// Open a viewer for `job_id`. An already open viewer for the job is
    /// closed first, so there is never more than one connection per job.
    pub fn open_viewer(&mut self, job_id: &str, stream_url: &str) -> InstanceId {
        let id = InstanceId::for_job(job_id);
        if self.close_viewer(&id).is_some() {
            tracing::info!(%id, "reopening viewer");
        }
        let events = self.connections.connect(id.as_str(), stream_url);
        let viewer = LogViewer::new(job_id, self.config.layout(), self.config.show_debug);
        self.instances.insert(id.clone(), Instance { viewer, events });
        tracing::info!(%id, stream_url, "viewer opened");
        id
    }

    /// Tear down a viewer. Records still in flight are applied first; the
    /// final viewer is handed back for the caller to inspect or drop.
    pub fn close_viewer(&mut self, id: &InstanceId) -> Option<LogViewer> {
        let mut instance = self.instances.remove(id)?;
        self.connections.disconnect(id.as_str());
        instance.drain();
        tracing::info!(%id, records = instance.viewer.buffer().total(), "viewer closed");
        Some(instance.viewer)
    }

    /// Map a "show logs for job" toggle onto open/close. Returns the
    /// instance id when the viewer is open afterwards.
    pub fn toggle_viewer(&mut self, job_id: &str, stream_url: &str) -> Option<InstanceId> {
        let id = InstanceId::for_job(job_id);
        if self.instances.contains_key(&id) {
            self.close_viewer(&id);
            None
        } else {
            Some(self.open_viewer(job_id, stream_url))
        }
    }

    pub fn is_open(&self, id: &InstanceId) -> bool {
        self.instances.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &InstanceId> + '_ {
        self.instances.keys()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Apply pending stream events and settle scroll checks on every viewer.
    /// Returns the number of events applied.
    pub fn pump(&mut self, now: Instant) -> usize {
        let mut applied = 0;
        for instance in self.instances.values_mut() {
            applied += instance.drain();
            instance.viewer.settle(now);
        }
        applied
    }

    pub fn viewer(&self, id: &InstanceId) -> Option<&LogViewer> {
        self.instances.get(id).map(|instance| &instance.viewer)
    }

    pub fn connection(&self, id: &InstanceId) -> Option<ConnectionSnapshot> {
        self.connections.snapshot(id.as_str())
    }

    pub fn set_search(&mut self, id: &InstanceId, text: &str) -> bool {
        self.with_viewer(id, |viewer| viewer.set_search(text))
    }

    pub fn set_show_debug(&mut self, id: &InstanceId, show: bool) -> bool {
        self.with_viewer(id, |viewer| viewer.set_show_debug(show))
    }

    pub fn toggle_follow_tail(&mut self, id: &InstanceId) -> bool {
        self.with_viewer(id, LogViewer::toggle_follow_tail)
    }

    pub fn select_line(&mut self, id: &InstanceId, line: Option<u64>) -> Option<DeepLink> {
        let instance = self.instances.get_mut(id)?;
        Some(instance.viewer.select_line(line).clone())
    }

    pub fn move_selection(&mut self, id: &InstanceId, delta: i64) -> Option<DeepLink> {
        let instance = self.instances.get_mut(id)?;
        instance.viewer.move_selection(delta).cloned()
    }

    pub fn open_at(&mut self, id: &InstanceId, line: u64) -> bool {
        self.with_viewer(id, |viewer| viewer.open_at(line))
    }

    pub fn toggle_fullscreen(&mut self, id: &InstanceId) -> bool {
        self.with_viewer(id, LogViewer::toggle_fullscreen)
    }

    pub fn exit_fullscreen(&mut self, id: &InstanceId) -> bool {
        self.with_viewer(id, LogViewer::exit_fullscreen)
    }

    pub fn scroll_by_rows(&mut self, id: &InstanceId, rows: i64, now: Instant) -> bool {
        self.with_viewer(id, |viewer| viewer.scroll_by_rows(rows, now))
    }

    pub fn on_scroll(&mut self, id: &InstanceId, offset: f64, now: Instant) -> bool {
        self.with_viewer(id, |viewer| viewer.on_scroll(offset, now))
    }

    pub fn resize(&mut self, id: &InstanceId, container_height: f64) -> bool {
        self.with_viewer(id, |viewer| viewer.resize(container_height))
    }

    fn with_viewer(&mut self, id: &InstanceId, f: impl FnOnce(&mut LogViewer)) -> bool {
        match self.instances.get_mut(id) {
            Some(instance) => {
                f(&mut instance.viewer);
                true
            }
            None => {
                tracing::debug!(%id, "ignoring call for closed viewer");
                false
            }
        }
    }
}
