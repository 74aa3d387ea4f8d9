//! Controller driving a computation in a background run thread.
//!
//! Three locks guard independent concerns and are never merged:
//! - **control** serializes `init`, `play`, `pause`, `stop`, `copy` and
//!   `set_conf`, so an implicit init-then-play never interleaves with a
//!   concurrent stop;
//! - **status** guards the lifecycle state and the request slot read by the
//!   run thread. Requests are answered through a condition variable, which
//!   gives the pause/resume handshake its rendezvous semantics;
//! - **model** is a reader/writer lock over the published centroids and
//!   runtime figures, written once per accepted iteration.
//!
//! Lock order is control, then status or model, then the timer slot. The
//! status and model locks are never held together.

use crate::error::panic_message;
use crate::figures::{
    DURATION, ITERATIONS, LAST_DATA_TIME, NEW_DATA, PLAY_ITERATIONS, PUSHED_DATA,
};
use crate::finishing::{self, Finishing};
use crate::timeout::{wait_timeout, InterruptionTimeout};
use crate::{
    Clust, Conf, Elemt, Error, Impl, Iteration, Model, Result, RuntimeFigures, Space, State,
    Status,
};
use log::{debug, error, info, warn};
use parking_lot::{Condvar, Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Longest time a waiting caller sleeps before re-evaluating its predicate.
const WAIT_STEP: Duration = Duration::from_millis(10);

/// Pause of the run loop after an iteration that did nothing.
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Request posted to the run thread.
#[derive(Debug, Clone, PartialEq)]
enum Request {
    Idle,
    Resume,
    /// Leave the run loop, failing with the error if any.
    Stop(Option<Error>),
}

/// How the run thread left the idle handshake.
enum Wake {
    Resumed,
    Stopped(Option<Error>),
}

struct StatusCell {
    status: Status,
    request: Option<Request>,
}

impl StatusCell {
    /// Posts a request unless a stop is already pending.
    fn post(&mut self, request: Request) {
        if !matches!(self.request, Some(Request::Stop(_))) {
            self.request = Some(request);
        }
    }
}

struct ModelState<E> {
    centroids: Option<Arc<Clust<E>>>,
    figures: RuntimeFigures,
}

/// Nearest centroid of a predicted element.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction<E> {
    /// Copy of the nearest centroid.
    pub centroid: E,
    /// Label of the nearest centroid.
    pub label: usize,
    /// Distance to the nearest centroid.
    pub distance: f64,
}

struct Shared<E: Elemt> {
    control: Mutex<()>,
    status: Mutex<StatusCell>,
    status_changed: Condvar,
    model: RwLock<ModelState<E>>,
    conf: RwLock<Arc<Conf>>,
    space: Arc<dyn Space<E>>,
    imp: Box<dyn Impl<E>>,
    runner: Mutex<Option<JoinHandle<()>>>,
    timer: Mutex<Option<InterruptionTimeout>>,
}

/// Online algorithm controller.
///
/// Owns a computation ([`Impl`]) and runs it in a background thread while
/// callers push data, read the current centroids and predict. Every method
/// can be called concurrently from any thread.
///
/// The notifier of the configuration runs inline on status changes, possibly
/// on the run thread: it must not call `init`, `play`, `pause`, `stop`,
/// `batch` or `copy` on the same controller.
pub struct Algo<E: Elemt> {
    shared: Arc<Shared<E>>,
}

impl<E: Elemt> Algo<E> {
    /// Creates a controller in the `Created` state.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn new(conf: Conf, space: Arc<dyn Space<E>>, imp: Box<dyn Impl<E>>) -> Result<Self> {
        conf.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                control: Mutex::new(()),
                status: Mutex::new(StatusCell {
                    status: Status::default(),
                    request: None,
                }),
                status_changed: Condvar::new(),
                model: RwLock::new(ModelState {
                    centroids: None,
                    figures: RuntimeFigures::new(),
                }),
                conf: RwLock::new(Arc::new(conf)),
                space,
                imp,
                runner: Mutex::new(None),
                timer: Mutex::new(None),
            }),
        })
    }

    /// Computes the initial centroids.
    ///
    /// Legal from `Created` and `Finished`; the latter resets the iteration
    /// counters first.
    ///
    /// # Errors
    /// Returns `AlreadyCreated` from any other state, or the computation's
    /// error, in which case the controller is `Failed`.
    pub fn init(&self) -> Result<()> {
        let _control = self.shared.control.lock();
        self.shared.init_locked()
    }

    /// Starts or resumes the run thread.
    ///
    /// Initializes first from `Created` or `Finished`, resumes from `Idle`
    /// and starts a run from `Ready`. Starting a run arms the configured
    /// timeout.
    ///
    /// # Errors
    /// Returns `Running` if already running, the stored error from `Failed`,
    /// or any initialization error.
    pub fn play(&self) -> Result<()> {
        let _control = self.shared.control.lock();
        let status = self.shared.status();
        match status.state {
            State::Created | State::Finished => {
                self.shared.init_locked()?;
                self.shared.start_locked()
            }
            State::Ready => self.shared.start_locked(),
            State::Idle => self.shared.resume_locked(),
            State::Running | State::Initializing => Err(Error::Running),
            State::Failed => Err(status.error.unwrap_or(Error::NotIdle)),
        }
    }

    /// Parks the run thread, blocking until it acknowledges.
    ///
    /// # Errors
    /// Returns `NotRunning` unless the controller is `Running`.
    pub fn pause(&self) -> Result<()> {
        let _control = self.shared.control.lock();
        let mut cell = self.shared.status.lock();
        if cell.status.state != State::Running {
            return Err(Error::NotRunning);
        }
        cell.post(Request::Idle);
        self.shared.status_changed.notify_all();
        while cell.status.state == State::Running {
            self.shared.status_changed.wait(&mut cell);
        }
        if cell.status.state == State::Idle {
            Ok(())
        } else {
            Err(Error::NotRunning)
        }
    }

    /// Stops the run thread if any and moves to `Finished`. Idempotent.
    ///
    /// A failure status becomes `Finished` carrying the same error.
    ///
    /// # Errors
    /// Returns `Thread` if the run thread could not be joined.
    pub fn stop(&self) -> Result<()> {
        let _control = self.shared.control.lock();
        self.shared.stop_locked()
    }

    /// Blocks until `finishing` (or the configuration's own stopping
    /// condition) holds, the run ends, or `timeout` elapses (zero waits
    /// forever).
    ///
    /// Returns immediately from `Ready` and `Finished`.
    ///
    /// # Errors
    /// - `NeverFinish` if nothing could ever end the wait, checked first;
    /// - `NotStarted` from `Created`, `NotRunning` from `Idle`;
    /// - the failure error if the run fails;
    /// - `Timeout` when `timeout` elapses.
    pub fn wait(&self, finishing: Option<&dyn Finishing>, timeout: Duration) -> Result<()> {
        let conf = self.conf();
        let own = conf.run_finishing();
        let predicate = finishing.or(own.as_deref());
        if predicate.is_none() && conf.timeout.is_zero() && timeout.is_zero() {
            return Err(Error::NeverFinish);
        }

        let status = self.shared.status();
        match status.state {
            State::Created => return Err(Error::NotStarted),
            State::Initializing | State::Idle => return Err(Error::NotRunning),
            State::Ready | State::Finished => return Ok(()),
            State::Failed => return Err(status.error.unwrap_or(Error::NotRunning)),
            State::Running => {}
        }

        wait_timeout(timeout, WAIT_STEP, |slice| {
            let (_, figures) = self.snapshot();
            let status = self.shared.status();
            match status.state {
                State::Running | State::Idle => {}
                State::Failed => return Some(Err(status.error.unwrap_or(Error::NotRunning))),
                _ => return Some(Ok(())),
            }
            if let Some(predicate) = predicate {
                if finishing::is_finished(predicate, &status, &figures) {
                    return Some(Ok(()));
                }
            }
            let mut cell = self.shared.status.lock();
            if cell.status.state.is_running() {
                self.shared.status_changed.wait_for(&mut cell, slice);
            }
            None
        })?
    }

    /// Runs a complete computation: stop, play, wait, stop.
    ///
    /// # Errors
    /// Returns `NeverFinish` without side effect if nothing could end the
    /// run, otherwise the first error of the sequence.
    pub fn batch(&self, finishing: Option<&dyn Finishing>, timeout: Duration) -> Result<()> {
        if finishing.is_none() && timeout.is_zero() && !self.conf().can_finish() {
            return Err(Error::NeverFinish);
        }
        self.stop()?;
        let outcome = self
            .play()
            .and_then(|()| self.wait(finishing, timeout));
        self.stop()?;
        outcome
    }

    /// Hands an element to the computation.
    ///
    /// On success the pushed-data figures are updated and, if the controller
    /// is `Ready` and `data_per_iter` elements arrived since the last start,
    /// a run is started.
    ///
    /// # Errors
    /// Returns the computation's push error, or a start error.
    #[allow(clippy::cast_precision_loss)]
    pub fn push(&self, elemt: E) -> Result<()> {
        let running = self.shared.state() == State::Running;
        self.shared.imp.push(elemt, running)?;

        let new_data = {
            let mut model = self.shared.model.write();
            model.figures.add(PUSHED_DATA, 1.0);
            model.figures.add(NEW_DATA, 1.0);
            model.figures.set(LAST_DATA_TIME, unix_now());
            model.figures.value(NEW_DATA)
        };

        let data_per_iter = self.conf().data_per_iter;
        if data_per_iter > 0
            && new_data >= data_per_iter as f64
            && self.shared.state() == State::Ready
        {
            let _control = self.shared.control.lock();
            if self.shared.state() == State::Ready {
                debug!("{new_data} new elements, restarting");
                self.shared.start_locked()?;
            }
        }
        Ok(())
    }

    /// Nearest current centroid of `elemt`. Never waits for the run thread.
    ///
    /// # Errors
    /// Returns `NoCentroids` before the first initialization.
    pub fn predict(&self, elemt: &E) -> Result<Prediction<E>> {
        let centroids = self.centroids()?;
        let (label, distance) = centroids
            .nearest(elemt, self.shared.space.as_ref())
            .ok_or(Error::NoCentroids)?;
        Ok(Prediction {
            centroid: self.shared.space.copy(&centroids[label]),
            label,
            distance,
        })
    }

    /// Last published centroids.
    ///
    /// # Errors
    /// Returns `NoCentroids` before the first initialization.
    pub fn centroids(&self) -> Result<Arc<Clust<E>>> {
        self.shared
            .model
            .read()
            .centroids
            .clone()
            .ok_or(Error::NoCentroids)
    }

    /// Current runtime figures.
    #[must_use]
    pub fn runtime_figures(&self) -> RuntimeFigures {
        self.shared.model.read().figures.clone()
    }

    /// Centroids and figures read together, so they belong to the same
    /// iteration.
    #[must_use]
    pub fn snapshot(&self) -> (Option<Arc<Clust<E>>>, RuntimeFigures) {
        self.shared.snapshot()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.shared.status()
    }

    /// Current configuration.
    #[must_use]
    pub fn conf(&self) -> Arc<Conf> {
        Arc::clone(&self.shared.conf.read())
    }

    /// Space used by the controller.
    #[must_use]
    pub fn space(&self) -> Arc<dyn Space<E>> {
        Arc::clone(&self.shared.space)
    }

    /// Replaces the configuration. The new one applies from the next start
    /// or resume.
    ///
    /// # Errors
    /// Returns `ConfigError` for an invalid configuration and `NotIdle`
    /// while the run thread iterates.
    pub fn set_conf(&self, conf: Conf) -> Result<()> {
        conf.validate()?;
        let _control = self.shared.control.lock();
        if matches!(
            self.shared.state(),
            State::Running | State::Initializing
        ) {
            return Err(Error::NotIdle);
        }
        *self.shared.conf.write() = Arc::new(conf);
        Ok(())
    }

    /// Creates an independent controller over a copy of the computation,
    /// with another configuration and space.
    ///
    /// The copy starts `Ready` with the current centroids and figures if
    /// any were computed, `Created` otherwise.
    ///
    /// # Errors
    /// Returns the configuration or computation copy error.
    pub fn copy(&self, conf: Conf, space: Arc<dyn Space<E>>) -> Result<Algo<E>> {
        let _control = self.shared.control.lock();
        let source_conf = self.conf();
        let imp = self
            .shared
            .with_model(&source_conf, |model| self.shared.imp.copy(model))?;
        let copy = Algo::new(conf, space, imp)?;

        let (centroids, figures) = self.snapshot();
        let ready = centroids.is_some();
        {
            let mut model = copy.shared.model.write();
            model.centroids = centroids;
            model.figures = figures;
        }
        if ready {
            copy.shared.status.lock().status = Status::new(State::Ready);
        }
        Ok(copy)
    }
}

impl<E: Elemt> Drop for Algo<E> {
    fn drop(&mut self) {
        let _control = self.shared.control.lock();
        let outcome = if self.shared.state().is_running() {
            self.shared.stop_locked()
        } else {
            self.shared.disable_timeout();
            self.shared.join_runner()
        };
        if let Err(err) = outcome {
            warn!("failed to stop algorithm on drop: {err}");
        }
    }
}

impl<E: Elemt> Shared<E> {
    fn state(&self) -> State {
        self.status.lock().status.state
    }

    fn status(&self) -> Status {
        self.status.lock().status.clone()
    }

    fn snapshot(&self) -> (Option<Arc<Clust<E>>>, RuntimeFigures) {
        let model = self.model.read();
        (model.centroids.clone(), model.figures.clone())
    }

    /// Sets the status, wakes waiters and calls the notifier.
    fn set_status(&self, status: Status) {
        {
            let mut cell = self.status.lock();
            cell.status = status.clone();
            self.status_changed.notify_all();
        }
        self.notify(&status);
    }

    fn notify(&self, status: &Status) {
        match &status.error {
            Some(err) => debug!("status: {:?} ({err})", status.state),
            None => debug!("status: {:?}", status.state),
        }
        let notifier = self.conf.read().notifier.clone();
        if let Some(notifier) = notifier {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| notifier(status))) {
                warn!("status notifier panicked: {}", panic_message(payload.as_ref()));
            }
        }
    }

    fn with_model<R>(&self, conf: &Conf, f: impl FnOnce(&Model<'_, E>) -> R) -> R {
        let (centroids, figures) = self.snapshot();
        let model = Model::new(conf, self.space.as_ref(), self.status(), figures, centroids);
        f(&model)
    }

    fn init_locked(&self) -> Result<()> {
        let state = self.state();
        if !matches!(state, State::Created | State::Finished) {
            return Err(Error::AlreadyCreated);
        }
        self.reset_counters();
        self.set_status(Status::new(State::Initializing));

        let conf = Arc::clone(&self.conf.read());
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.with_model(&conf, |model| self.imp.init(model))
        }))
        .unwrap_or_else(|payload| Err(Error::Panic(panic_message(payload.as_ref()))));

        match outcome {
            Ok(centroids) => {
                debug!("initialized {} centroids", centroids.len());
                self.model.write().centroids = Some(Arc::new(centroids));
                self.set_status(Status::new(State::Ready));
                Ok(())
            }
            Err(err) => {
                error!("initialization failed: {err}");
                self.set_status(Status::with_error(State::Failed, Some(err.clone())));
                Err(err)
            }
        }
    }

    /// Zeroes iteration counters, keeping the pushed-data figures.
    fn reset_counters(&self) {
        let mut model = self.model.write();
        let mut figures = RuntimeFigures::new();
        for name in [PUSHED_DATA, NEW_DATA, LAST_DATA_TIME] {
            if let Some(value) = model.figures.get(name) {
                figures.set(name, value);
            }
        }
        figures.set(ITERATIONS, 0.0);
        figures.set(PLAY_ITERATIONS, 0.0);
        figures.set(DURATION, 0.0);
        model.figures = figures;
    }

    fn start_locked(self: &Arc<Self>) -> Result<()> {
        self.join_runner()?;
        let conf = Arc::clone(&self.conf.read());
        {
            let mut model = self.model.write();
            model.figures.set(PLAY_ITERATIONS, 0.0);
            model.figures.set(NEW_DATA, 0.0);
        }
        self.status.lock().request = None;
        self.set_status(Status::new(State::Running));

        let started = self.arm_timeout(&conf).and_then(|()| {
            let shared = Arc::clone(self);
            thread::Builder::new()
                .name("clustream-run".to_string())
                .spawn(move || shared.run())
                .map_err(Error::from)
        });
        match started {
            Ok(handle) => {
                *self.runner.lock() = Some(handle);
                Ok(())
            }
            Err(err) => {
                error!("failed to start run thread: {err}");
                self.disable_timeout();
                self.set_status(Status::new(State::Ready));
                Err(err)
            }
        }
    }

    fn resume_locked(&self) -> Result<()> {
        let mut cell = self.status.lock();
        cell.post(Request::Resume);
        self.status_changed.notify_all();
        while cell.status.state == State::Idle {
            self.status_changed.wait(&mut cell);
        }
        match cell.status.state {
            State::Running => Ok(()),
            _ => Err(cell.status.error.clone().unwrap_or(Error::NotIdle)),
        }
    }

    fn stop_locked(&self) -> Result<()> {
        {
            let mut cell = self.status.lock();
            if cell.status.state.is_running() {
                cell.post(Request::Stop(None));
                self.status_changed.notify_all();
            }
        }
        let joined = self.join_runner();
        self.disable_timeout();

        let status = self.status();
        match status.state {
            State::Finished => {}
            State::Failed => self.set_status(Status::with_error(State::Finished, status.error)),
            _ => self.set_status(Status::new(State::Finished)),
        }
        joined
    }

    fn join_runner(&self) -> Result<()> {
        let handle = self.runner.lock().take();
        match handle {
            Some(handle) => handle
                .join()
                .map_err(|payload| Error::Thread(panic_message(payload.as_ref()))),
            None => Ok(()),
        }
    }

    fn arm_timeout(self: &Arc<Self>, conf: &Conf) -> Result<()> {
        let mut timer = self.timer.lock();
        if let Some(previous) = timer.take() {
            previous.disable();
        }
        if conf.timeout.is_zero() {
            return Ok(());
        }
        let shared = Arc::downgrade(self);
        *timer = Some(InterruptionTimeout::new(conf.timeout, move |state, err| {
            if let Some(shared) = shared.upgrade() {
                shared.interrupt(state, err);
            }
        })?);
        Ok(())
    }

    fn disable_timeout(&self) {
        let timer = self.timer.lock().take();
        if let Some(timer) = timer {
            timer.disable();
        }
    }

    /// Asks the run thread to stop, failing with `err` if `state` is
    /// `Failed`.
    fn interrupt(&self, state: State, err: Error) {
        let mut cell = self.status.lock();
        if cell.status.state.is_running() {
            warn!("interrupting run: {err}");
            let cause = (state == State::Failed).then_some(err);
            cell.request = Some(Request::Stop(cause));
            self.status_changed.notify_all();
        }
    }

    /// Body of the run thread.
    fn run(self: Arc<Self>) {
        debug!("run thread started");
        let started = Instant::now();
        let failure = catch_unwind(AssertUnwindSafe(|| self.run_loop())).unwrap_or_else(|payload| {
            let msg = panic_message(payload.as_ref());
            error!("computation panicked: {msg}");
            Some(Error::Panic(msg))
        });

        self.disable_timeout();
        self.model
            .write()
            .figures
            .add(DURATION, started.elapsed().as_secs_f64());

        let status = match failure {
            None => {
                info!(
                    "run ended after {} iterations",
                    self.model.read().figures.value(PLAY_ITERATIONS)
                );
                Status::new(State::Ready)
            }
            Some(err) => Status::with_error(State::Failed, Some(err)),
        };
        {
            let mut cell = self.status.lock();
            cell.request = None;
            cell.status = status.clone();
            self.status_changed.notify_all();
        }
        self.notify(&status);
        debug!("run thread exited");
    }

    /// Iterates until stopped or finished. Returns the failure, if any.
    fn run_loop(&self) -> Option<Error> {
        let mut conf = Arc::clone(&self.conf.read());
        let mut finishing = conf.run_finishing();

        loop {
            let request = self.status.lock().request.take();
            match request {
                Some(Request::Stop(cause)) => return cause,
                Some(Request::Idle) => match self.idle() {
                    Wake::Stopped(cause) => return cause,
                    Wake::Resumed => {
                        conf = Arc::clone(&self.conf.read());
                        finishing = conf.run_finishing();
                    }
                },
                Some(Request::Resume) | None => {}
            }

            if let Some(finishing) = &finishing {
                let (_, figures) = self.snapshot();
                if finishing::is_finished(finishing.as_ref(), &self.status(), &figures) {
                    return None;
                }
            }

            let tick = Instant::now();
            match self.with_model(&conf, |model| self.imp.iterate(model)) {
                Err(err) => {
                    error!("iteration failed: {err}");
                    return Some(err);
                }
                Ok(Some(iteration)) => self.publish(iteration),
                Ok(None) => self.sleep(IDLE_BACKOFF),
            }

            if let Some(period) = conf.iter_period() {
                if let Some(remaining) = period.checked_sub(tick.elapsed()) {
                    self.sleep(remaining);
                }
            }
        }
    }

    /// Idle handshake: acknowledges the pause and parks until resumed or
    /// stopped.
    fn idle(&self) -> Wake {
        self.set_status(Status::new(State::Idle));
        let mut cell = self.status.lock();
        loop {
            match cell.request.take() {
                Some(Request::Resume) => {
                    let running = Status::new(State::Running);
                    cell.status = running.clone();
                    self.status_changed.notify_all();
                    drop(cell);
                    self.notify(&running);
                    return Wake::Resumed;
                }
                Some(Request::Stop(cause)) => return Wake::Stopped(cause),
                Some(Request::Idle) | None => self.status_changed.wait(&mut cell),
            }
        }
    }

    /// Sleeps up to `duration`, waking early on any request.
    fn sleep(&self, duration: Duration) {
        let mut cell = self.status.lock();
        if cell.request.is_none() {
            self.status_changed.wait_for(&mut cell, duration);
        }
    }

    /// Replaces the published centroids and figures.
    fn publish(&self, iteration: Iteration<E>) {
        let Iteration {
            centroids,
            mut figures,
        } = iteration;
        {
            let mut model = self.model.write();
            figures.carry_over(&model.figures);
            figures.add(ITERATIONS, 1.0);
            figures.add(PLAY_ITERATIONS, 1.0);
            model.figures = figures;
            model.centroids = Some(Arc::new(centroids));
        }
        let _cell = self.status.lock();
        self.status_changed.notify_all();
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |elapsed| elapsed.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_keeps_pending_stop() {
        let mut cell = StatusCell {
            status: Status::new(State::Running),
            request: None,
        };
        cell.post(Request::Idle);
        assert_eq!(cell.request, Some(Request::Idle));

        cell.post(Request::Stop(Some(Error::Timeout)));
        cell.post(Request::Resume);
        assert_eq!(cell.request, Some(Request::Stop(Some(Error::Timeout))));
    }

    #[test]
    fn test_unix_now_is_positive() {
        assert!(unix_now() > 0.0);
    }
}
