//! Kernel filesystem adapter.
//!
//! Implements the FUSE operation set over the topic tree and glues the
//! broker client to it: kernel writes become publishes, inbound
//! publishes become tree updates plus poll wakeups. The fuser session
//! drives this from the main thread; `store_publish` runs on the
//! broker worker thread. Both sides funnel through the tree mutex.

use std::ffi::OsStr;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, Notifier, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyPoll, ReplyWrite, Request,
    TimeOrNow,
};
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::client::MqttClient;
use crate::tree::{Ino, Node, Tree};

/// Attribute cache time handed to the kernel. Zero: the tree changes
/// underneath the kernel whenever the broker speaks.
const TTL: Duration = Duration::ZERO;

/// Poll request flag asking us to remember the kernel handle and
/// notify it on the next update.
const POLL_SCHEDULE_NOTIFY: u32 = 1 << 0;

/// Build the kernel-visible attributes for a node.
fn node_attr(ino: Ino, node: &Node, uid: u32, gid: u32) -> FileAttr {
    let is_dir = node.presents_as_dir();
    let size = node.size();
    FileAttr {
        ino,
        size,
        blocks: size.div_ceil(512),
        atime: node.atime,
        mtime: node.mtime,
        ctime: node.mtime,
        crtime: node.mtime,
        kind: if is_dir {
            FileType::Directory
        } else {
            FileType::RegularFile
        },
        perm: if is_dir { 0o755 } else { 0o644 },
        nlink: if is_dir { 2 } else { 1 },
        uid,
        gid,
        rdev: 0,
        blksize: 512,
        flags: 0,
    }
}

/// Store an inbound publish into the tree and wake every poller that
/// registered for notification on the target file.
///
/// Runs on the broker worker thread. Failures are logged and the
/// message dropped; the worker keeps going. The notifier slot is
/// filled right after the session is created; before that no handle
/// can exist, so there is no wakeup to miss.
pub fn store_publish(
    tree: &Mutex<Tree>,
    notifier: &OnceLock<Notifier>,
    topic: &[u8],
    payload: &[u8],
) {
    let topic = match std::str::from_utf8(topic) {
        Ok(s) => s,
        Err(_) => {
            warn!("dropping publish with non-utf8 topic");
            return;
        }
    };
    debug!("storing {} ({} bytes)", topic, payload.len());

    let mut tree = tree.lock();
    match tree.insert_path(topic, payload) {
        Ok((_, tokens)) => {
            if let Some(notifier) = notifier.get() {
                for kh in tokens {
                    if let Err(e) = notifier.poll(kh) {
                        warn!("failed to wake poll handle {}: {}", kh, e);
                    }
                }
            }
        }
        Err(e) => warn!("dropping publish to {}: {}", topic, e),
    }
}

pub struct TopicFs {
    tree: Arc<Mutex<Tree>>,
    client: MqttClient,
    uid: u32,
    gid: u32,
}

impl TopicFs {
    pub fn new(tree: Arc<Mutex<Tree>>, client: MqttClient) -> Self {
        Self {
            tree,
            client,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
        }
    }
}

impl Filesystem for TopicFs {
    fn init(
        &mut self,
        _req: &Request<'_>,
        _config: &mut KernelConfig,
    ) -> Result<(), libc::c_int> {
        Ok(())
    }

    fn destroy(&mut self) {
        self.client.shutdown();
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let name = match name.to_str() {
            Some(n) => n,
            None => return reply.error(libc::ENOENT),
        };
        let tree = self.tree.lock();
        match tree.lookup(parent, name) {
            Ok(ino) => {
                let node = tree.node(ino).expect("looked-up node exists");
                reply.entry(&TTL, &node_attr(ino, node, self.uid, self.gid), 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, _ino: u64, _nlookup: u64) {
        // Kernel reference counting only; nothing to do.
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let tree = self.tree.lock();
        match tree.node(ino) {
            Some(node) => reply.attr(&TTL, &node_attr(ino, node, self.uid, self.gid)),
            None => reply.error(libc::ENOENT),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let to_system_time = |t: TimeOrNow| match t {
            TimeOrNow::SpecificTime(t) => t,
            TimeOrNow::Now => SystemTime::now(),
        };

        let mut tree = self.tree.lock();
        if let Some(size) = size {
            if let Err(e) = tree.truncate(ino, size) {
                return reply.error(e.errno());
            }
        }
        if let Err(e) = tree.set_times(ino, atime.map(to_system_time), mtime.map(to_system_time))
        {
            return reply.error(e.errno());
        }
        let node = tree.node(ino).expect("times were just set");
        reply.attr(&TTL, &node_attr(ino, node, self.uid, self.gid));
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let name = match name.to_str() {
            Some(n) => n,
            None => return reply.error(libc::EINVAL),
        };
        let mut tree = self.tree.lock();
        match tree.mkdir(parent, name) {
            Ok(ino) => {
                let node = tree.node(ino).expect("mkdir created node");
                reply.entry(&TTL, &node_attr(ino, node, self.uid, self.gid), 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        self.remove_child(parent, name, reply);
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        self.remove_child(parent, name, reply);
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        _parent: u64,
        _name: &OsStr,
        _newparent: u64,
        _newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        // A rename has no coherent meaning for open or polled topics.
        reply.error(libc::EPERM);
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let mut tree = self.tree.lock();
        match tree.open(ino) {
            Ok(fh) => reply.opened(fh, fuser::consts::FOPEN_DIRECT_IO),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        self.tree.lock().release(fh);
        reply.ok();
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        if offset < 0 {
            return reply.error(libc::EINVAL);
        }
        let mut tree = self.tree.lock();
        match tree.read_at(fh, offset as u64, size) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        // A write replaces the whole payload; there is no meaningful
        // byte-range update of a retained message.
        if offset != 0 {
            return reply.error(libc::EINVAL);
        }

        let mut tree = self.tree.lock();
        let ino = match tree.handle(fh) {
            Some(handle) => handle.ino,
            None => return reply.error(libc::ENOENT),
        };
        let topic = match tree.topic_of(ino) {
            Some(t) => t,
            None => return reply.error(libc::ENOENT),
        };

        // Newest payload wins: supersede any publish for this topic
        // still waiting out its holdback.
        self.client.cancel(&topic);
        if let Err(e) = self.client.publish(&topic, data) {
            warn!("failed to publish {}: {}", topic, e);
            return reply.error(libc::EIO);
        }
        if let Err(e) = tree.set_payload(ino, data) {
            return reply.error(e.errno());
        }
        reply.written(data.len() as u32);
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let name = match name.to_str() {
            Some(n) => n,
            None => return reply.error(libc::EINVAL),
        };
        let mut tree = self.tree.lock();
        match tree.create_file(parent, name) {
            Ok((ino, fh)) => {
                let node = tree.node(ino).expect("create made node");
                reply.created(
                    &TTL,
                    &node_attr(ino, node, self.uid, self.gid),
                    0,
                    fh,
                    fuser::consts::FOPEN_DIRECT_IO,
                );
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let mut tree = self.tree.lock();
        match tree.opendir(ino) {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let tree = self.tree.lock();
        let entries = match tree.readdir_entries(fh) {
            Ok(entries) => entries,
            Err(e) => return reply.error(e.errno()),
        };
        for (i, entry) in entries.iter().enumerate().skip(offset as usize) {
            let kind = if entry.is_dir {
                FileType::Directory
            } else {
                FileType::RegularFile
            };
            if reply.add(entry.ino, (i + 1) as i64, kind, &entry.name) {
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        self.tree.lock().releasedir(fh);
        reply.ok();
    }

    fn poll(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        kh: u64,
        _events: u32,
        flags: u32,
        reply: ReplyPoll,
    ) {
        let stored_kh = (flags & POLL_SCHEDULE_NOTIFY != 0).then_some(kh);
        let mut tree = self.tree.lock();
        match tree.poll(fh, stored_kh) {
            // Topic files are always writable; readable means a fresh
            // payload arrived since the last look.
            Ok(updated) => {
                let mut revents = libc::POLLOUT as u32;
                if updated {
                    revents |= libc::POLLIN as u32;
                }
                reply.poll(revents);
            }
            Err(e) => reply.error(e.errno()),
        }
    }
}

impl TopicFs {
    fn remove_child(&mut self, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let name = match name.to_str() {
            Some(n) => n,
            None => return reply.error(libc::ENOENT),
        };
        let mut tree = self.tree.lock();
        match tree.remove(parent, name) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }
}
