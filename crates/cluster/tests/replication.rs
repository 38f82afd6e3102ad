//! Snapshot replication through the `Host` trait with an in-memory loopback host.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use bytes::Bytes;
use cluster::{
    subscription, ActiveJob, AttachClient, AttachRequest, Event, EventKind, EventScope, Host,
    HostError, HostId, ImagePullRequest, JobId, ProviderId, PullInfo, SnapshotStream,
    Subscription, TrustDatabase, VolumeId, VolumeInfo,
};
use futures::{stream, StreamExt, TryStreamExt};
use tokio::sync::mpsc;

/// Fleet directory used by a receiving host to reach source hosts.
type Fleet = Mutex<HashMap<HostId, Weak<LoopbackHost>>>;

struct LoopbackHost {
    id: HostId,
    fleet: Arc<Fleet>,
    volumes: Mutex<HashMap<VolumeId, (VolumeInfo, Vec<u8>)>>,
    next: Mutex<u32>,
}

impl LoopbackHost {
    fn join(id: &str, fleet: &Arc<Fleet>) -> Arc<Self> {
        let host = Arc::new(Self {
            id: HostId::new(id).unwrap(),
            fleet: fleet.clone(),
            volumes: Mutex::new(HashMap::new()),
            next: Mutex::new(0),
        });
        fleet
            .lock()
            .unwrap()
            .insert(host.id.clone(), Arc::downgrade(&host));
        host
    }

    fn allocate(&self, parent: Option<VolumeId>, data: Vec<u8>) -> VolumeInfo {
        let mut next = self.next.lock().unwrap();
        *next += 1;
        let info = VolumeInfo {
            id: VolumeId::new(format!("{}-vol{}", self.id, *next)).unwrap(),
            provider_id: ProviderId::default_provider(),
            parent_id: parent,
            created_at: None,
        };
        self.volumes
            .lock()
            .unwrap()
            .insert(info.id.clone(), (info.clone(), data));
        info
    }

    fn write(&self, volume: &VolumeId, data: &[u8]) {
        self.volumes.lock().unwrap().get_mut(volume).unwrap().1 = data.to_vec();
    }

    fn data(&self, volume: &VolumeId) -> Vec<u8> {
        self.volumes.lock().unwrap()[volume].1.clone()
    }

    fn not_found(what: &VolumeId) -> HostError {
        HostError::NotFound {
            resource: what.to_string(),
        }
    }

    fn unsupported() -> HostError {
        HostError::Application {
            status: 501,
            message: "not supported by loopback host".into(),
        }
    }
}

#[async_trait]
impl Host for LoopbackHost {
    fn id(&self) -> &HostId {
        &self.id
    }

    async fn list_jobs(&self) -> Result<HashMap<JobId, ActiveJob>, HostError> {
        Ok(HashMap::new())
    }

    async fn get_job(&self, id: &JobId) -> Result<ActiveJob, HostError> {
        Err(HostError::NotFound {
            resource: id.to_string(),
        })
    }

    async fn stop_job(&self, _id: &JobId) -> Result<(), HostError> {
        Ok(())
    }

    async fn stream_events(
        &self,
        scope: EventScope,
        sink: mpsc::Sender<Event>,
    ) -> Result<Subscription, HostError> {
        let job_id = match scope {
            EventScope::Job(id) => id,
            EventScope::All => JobId::new("job-1").unwrap(),
        };
        let events = stream::iter(vec![Ok(Event {
            event: EventKind::Start,
            job_id,
            job: None,
        })])
        .chain(stream::pending());
        Ok(Subscription::spawn(move |cancel| {
            subscription::forward(events, sink, cancel)
        }))
    }

    async fn attach(&self, _req: &AttachRequest, _wait: bool) -> Result<AttachClient, HostError> {
        Err(Self::unsupported())
    }

    async fn create_volume(&self, _provider: &ProviderId) -> Result<VolumeInfo, HostError> {
        Ok(self.allocate(None, Vec::new()))
    }

    async fn destroy_volume(&self, volume: &VolumeId) -> Result<(), HostError> {
        self.volumes
            .lock()
            .unwrap()
            .remove(volume)
            .map(drop)
            .ok_or_else(|| Self::not_found(volume))
    }

    async fn create_snapshot(&self, volume: &VolumeId) -> Result<VolumeInfo, HostError> {
        let data = self
            .volumes
            .lock()
            .unwrap()
            .get(volume)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| Self::not_found(volume))?;
        Ok(self.allocate(Some(volume.clone()), data))
    }

    async fn pull_snapshot(
        &self,
        receive_volume: &VolumeId,
        source_host: &HostId,
        source_snapshot: &VolumeId,
    ) -> Result<VolumeInfo, HostError> {
        if !self.volumes.lock().unwrap().contains_key(receive_volume) {
            return Err(Self::not_found(receive_volume));
        }
        let source = self
            .fleet
            .lock()
            .unwrap()
            .get(source_host)
            .and_then(Weak::upgrade)
            .ok_or_else(|| HostError::transport("dial source host", "no route to host"))?;
        let stream = source.send_snapshot(source_snapshot, &[]).await?;
        let chunks: Vec<Bytes> = stream.try_collect().await?;
        Ok(self.allocate(Some(source_snapshot.clone()), chunks.concat()))
    }

    async fn send_snapshot(
        &self,
        snapshot: &VolumeId,
        _assume_haves: &[serde_json::Value],
    ) -> Result<SnapshotStream, HostError> {
        let data = self
            .volumes
            .lock()
            .unwrap()
            .get(snapshot)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| Self::not_found(snapshot))?;
        let chunks: Vec<Result<Bytes, HostError>> = data
            .chunks(4)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn pull_images(
        &self,
        _req: &ImagePullRequest,
        _trust_db: TrustDatabase,
        _sink: mpsc::Sender<PullInfo>,
    ) -> Result<Subscription, HostError> {
        Err(Self::unsupported())
    }
}

#[tokio::test]
async fn pulled_snapshot_traces_back_to_the_source_snapshot() {
    let fleet = Arc::new(Fleet::default());
    let host_a = LoopbackHost::join("host-a", &fleet);
    let host_b = LoopbackHost::join("host-b", &fleet);

    let volume = host_a
        .create_volume(&ProviderId::default_provider())
        .await
        .unwrap();
    host_a.write(&volume.id, b"database pages");
    let snap_x = host_a.create_snapshot(&volume.id).await.unwrap();
    let receive = host_b
        .create_volume(&ProviderId::default_provider())
        .await
        .unwrap();

    let receiver: &dyn Host = &*host_b;
    let pulled = receiver
        .pull_snapshot(&receive.id, host_a.id(), &snap_x.id)
        .await
        .unwrap();

    assert_eq!(pulled.parent_id.as_ref(), Some(&snap_x.id));
    assert_eq!(snap_x.parent_id.as_ref(), Some(&volume.id));
    assert_eq!(host_b.data(&pulled.id), b"database pages");
}

#[tokio::test]
async fn unknown_source_snapshot_surfaces_as_not_found() {
    let fleet = Arc::new(Fleet::default());
    let host_a = LoopbackHost::join("host-a", &fleet);
    let host_b = LoopbackHost::join("host-b", &fleet);
    let receive = host_b
        .create_volume(&ProviderId::default_provider())
        .await
        .unwrap();

    let err = host_b
        .pull_snapshot(&receive.id, host_a.id(), &VolumeId::new("snap-missing").unwrap())
        .await
        .unwrap_err();

    assert!(err.is_not_found(), "{err:?}");
}

#[tokio::test]
async fn unreachable_source_surfaces_as_transport() {
    let fleet = Arc::new(Fleet::default());
    let host_b = LoopbackHost::join("host-b", &fleet);
    let receive = host_b
        .create_volume(&ProviderId::default_provider())
        .await
        .unwrap();

    let err = host_b
        .pull_snapshot(
            &receive.id,
            &HostId::new("host-gone").unwrap(),
            &VolumeId::new("snap-x").unwrap(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HostError::Transport { .. }));
}

#[tokio::test]
async fn cancelled_event_subscription_delivers_nothing_more() {
    let fleet = Arc::new(Fleet::default());
    let host = LoopbackHost::join("host-a", &fleet);
    let (tx, mut rx) = mpsc::channel(4);

    let sub = host.stream_events(EventScope::All, tx).await.unwrap();
    assert_eq!(rx.recv().await.unwrap().event, EventKind::Start);
    sub.cancel();
    sub.cancel();

    assert_eq!(sub.finish().await, Ok(()));
    assert!(rx.recv().await.is_none());
}
