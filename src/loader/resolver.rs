//! Sound source resolution
//!
//! A pad sound can be played once we know a url the fetcher understands.
//! Strategies, in order:
//! 1. a url the record already carries
//! 2. a signed download url for a storage object (may fail, then fall through)
//! 3. the stored path itself, for predefined sounds that ship on disk
//!
//! When every strategy fails the sound is unplayable for the rest of the
//! session. Results are cached per sound id, so a storage object gets
//! signed once per view rather than once per step.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use super::signer::UrlSigner;
use crate::pipeline::sound::{PadSound, SourceKind, StoredPath};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Playable(String),
    Unplayable,
}

pub struct SoundResolver {
    signer: Arc<dyn UrlSigner>,
    resolved: Mutex<HashMap<String, Resolution>>,
}

impl SoundResolver {
    pub fn new(signer: Arc<dyn UrlSigner>) -> Self {
        Self {
            signer,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// A cached answer, if there is one. Never blocks on the signer.
    pub fn peek(&self, sound_id: &str) -> Option<Resolution> {
        self.resolved.lock().ok()?.get(sound_id).cloned()
    }

    /// Resolve and cache. May block on the signer, so keep it off the tick path.
    pub fn resolve(&self, sound: &PadSound) -> Resolution {
        if let Some(known) = self.peek(&sound.sound_id) {
            return known;
        }
        let resolution = match self.first_playable(sound) {
            Some(url) => Resolution::Playable(url),
            None => {
                log::warn!(
                    "no playable source for {} ({:?}, {:?}), skipping it this session",
                    sound.sound_id,
                    sound.kind,
                    sound.stored_path
                );
                Resolution::Unplayable
            }
        };
        if let Ok(mut resolved) = self.resolved.lock() {
            resolved.insert(sound.sound_id.clone(), resolution.clone());
        }
        resolution
    }

    fn first_playable(&self, sound: &PadSound) -> Option<String> {
        carried_url(sound)
            .or_else(|| self.signed_url(sound))
            .or_else(|| local_path(sound))
    }

    fn signed_url(&self, sound: &PadSound) -> Option<String> {
        match &sound.stored_path {
            Some(StoredPath::Storage(object)) => {
                let url = self.signer.sign(object);
                if url.is_none() {
                    log::debug!("could not sign {object} for {}", sound.sound_id);
                }
                url
            }
            Some(StoredPath::Local(_)) | None => None,
        }
    }
}

fn carried_url(sound: &PadSound) -> Option<String> {
    sound.playable_url.clone().filter(|u| !u.trim().is_empty())
}

fn local_path(sound: &PadSound) -> Option<String> {
    match (sound.kind, &sound.stored_path) {
        (SourceKind::Predefined, Some(StoredPath::Local(path))) if !path.is_empty() => {
            Some(path.clone())
        }
        // uploads and recordings are never read straight off disk
        (SourceKind::Uploaded | SourceKind::Live, _) => None,
        _ => None,
    }
}

/// Runs a [`SoundResolver`] on its own thread so the tick path only ever
/// asks "do we know yet?" and moves on.
pub struct ResolverService {
    resolver: Arc<SoundResolver>,
    request_tx: Option<Sender<PadSound>>,
    result_rx: Receiver<(String, Resolution)>,
    in_flight: HashSet<String>,
    handle: Option<JoinHandle<()>>,
}

impl ResolverService {
    pub fn new(signer: Arc<dyn UrlSigner>) -> Self {
        let resolver = Arc::new(SoundResolver::new(signer));
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<PadSound>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();

        let worker = resolver.clone();
        let handle = thread::Builder::new()
            .name("padloop-resolver".to_string())
            .spawn(move || {
                while let Ok(sound) = request_rx.recv() {
                    let resolution = worker.resolve(&sound);
                    if result_tx.send((sound.sound_id, resolution)).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| log::error!("failed to spawn resolver thread: {e}"))
            .ok();

        Self {
            resolver,
            request_tx: Some(request_tx),
            result_rx,
            in_flight: HashSet::new(),
            handle,
        }
    }

    pub fn resolver(&self) -> &SoundResolver {
        &self.resolver
    }

    /// The answer if we have one; otherwise queue the work (once) and return None.
    pub fn request(&mut self, sound: &PadSound) -> Option<Resolution> {
        if let Some(known) = self.resolver.peek(&sound.sound_id) {
            return Some(known);
        }
        if self.in_flight.contains(&sound.sound_id) {
            return None;
        }
        let queued = self
            .request_tx
            .as_ref()
            .is_some_and(|tx| tx.send(sound.clone()).is_ok());
        if queued {
            self.in_flight.insert(sound.sound_id.clone());
            None
        } else {
            // no thread to hand it to, do it here
            Some(self.resolver.resolve(sound))
        }
    }

    /// Resolutions that finished since the last call.
    pub fn poll(&mut self) -> Vec<(String, Resolution)> {
        let done: Vec<_> = self.result_rx.try_iter().collect();
        for (sound_id, _) in &done {
            self.in_flight.remove(sound_id);
        }
        done
    }

    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// Block until nothing is in flight. Warm-up and tests only.
    pub fn wait_idle(&mut self, timeout: Duration) -> Vec<(String, Resolution)> {
        let deadline = Instant::now() + timeout;
        let mut done = Vec::new();
        while !self.in_flight.is_empty() && Instant::now() < deadline {
            match self.result_rx.recv_timeout(Duration::from_millis(5)) {
                Ok(item) => {
                    self.in_flight.remove(&item.0);
                    done.push(item);
                }
                Err(_) => continue,
            }
        }
        done
    }

    pub fn shutdown(&mut self) {
        self.request_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("resolver thread panicked");
            }
        }
    }
}

impl Drop for ResolverService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
