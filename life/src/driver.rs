use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::runtime::{self, Handle, Runtime};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::Config;
use crate::error::Result;
use crate::grid::Grid;

/// One published generation, as seen by a renderer.
///
/// A frame is replaced as a whole on every publication, so `iteration` and
/// `cells` always describe the same generation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub width: usize,
    pub height: usize,
    /// Completed generations in the run; 0 is the seeded grid.
    pub iteration: u64,
    cells: Vec<bool>,
}

impl Frame {
    /// Copy the grid's current generation into a newly reserved frame.
    fn capture(grid: &Grid, iteration: u64) -> Result<Frame> {
        let (width, height) = grid.dimensions();
        let mut cells = crate::grid::alloc_buffer(grid.current_buffer().len(), width, height)?;
        cells.copy_from_slice(grid.current_buffer());
        Ok(Frame {
            width,
            height,
            iteration,
            cells,
        })
    }

    /// Overwrite with the grid's current generation, reusing the cell buffer.
    fn publish(&mut self, grid: &Grid, iteration: u64) {
        self.cells.copy_from_slice(grid.current_buffer());
        self.iteration = iteration;
    }

    /// Row-major cell states.
    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    /// State of the cell at (x, y).
    ///
    /// # Panics
    ///
    /// If (x, y) is outside the frame.
    pub fn is_alive(&self, x: usize, y: usize) -> bool {
        assert!(
            x < self.width && y < self.height,
            "cell ({x}, {y}) outside {}x{} frame",
            self.width,
            self.height
        );
        self.cells[y * self.width + x]
    }

    /// Number of live cells.
    pub fn population(&self) -> usize {
        self.cells.iter().filter(|&&alive| alive).count()
    }

    /// Coordinates of the live cells, row-major.
    pub fn live_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(move |(idx, _)| (idx % width, idx / width))
    }
}

/// Drawable area last reported by the UI, in pixels. Only kept for layout;
/// it never changes the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// No run has been started yet.
    Idle,
    Running,
    /// The last run's loop has exited. A new `start` begins a fresh run.
    Stopped,
}

enum Run {
    Idle,
    Active {
        /// Ends the run's scheduling loop. The loop only looks at it while
        /// waiting between generations, so a step in progress always
        /// completes and is published first.
        notify_shutdown: broadcast::Sender<()>,
        handle: JoinHandle<()>,
    },
    Finished,
}

/// Owns a simulation run and steps it on a background worker.
///
/// The driver is meant to be held by a UI: `start` and `stop` are the button
/// and shutdown hooks, `frame` is called from the redraw path and `resize`
/// from the window's size notifications. None of them block on the worker
/// beyond the brief lock guarding the published frame.
pub struct Driver {
    config: Config,
    rng: StdRng,

    /// Dedicated single-worker runtime the scheduling loop runs on. Only an
    /// `Option` so `Drop` can shut it down without blocking.
    runtime: Option<Runtime>,
    handle: Handle,

    /// Publication point for finished generations.
    ///
    /// The worker is the only writer. It fills the next generation into the
    /// grid's spare buffer and only then copies it here under the channel's
    /// write lock, together with the iteration count. Readers therefore see
    /// either the previous generation or the new one, never a mix.
    frames: Arc<watch::Sender<Frame>>,

    viewport: Viewport,
    run: Run,
}

impl Driver {
    /// Create an idle driver. Uses a seeded entropy source when the config
    /// carries a seed, the OS otherwise.
    pub fn new(config: Config) -> Result<Driver> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Driver::with_rng(config, rng)
    }

    /// Create an idle driver drawing its random seeding from `rng`.
    pub fn with_rng(config: Config, rng: StdRng) -> Result<Driver> {
        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("life-sim")
            .enable_time()
            .build()?;
        let handle = runtime.handle().clone();
        let (frames, _) = watch::channel(Frame::default());

        Ok(Driver {
            config,
            rng,
            runtime: Some(runtime),
            handle,
            frames: Arc::new(frames),
            viewport: Viewport::default(),
            run: Run::Idle,
        })
    }

    /// Configuration every run of this driver uses.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Where the driver is in its Idle, Running, Stopped cycle.
    pub fn state(&self) -> RunState {
        match &self.run {
            Run::Idle => RunState::Idle,
            Run::Active { handle, .. } if !handle.is_finished() => RunState::Running,
            Run::Active { .. } | Run::Finished => RunState::Stopped,
        }
    }

    /// Seed a new grid and launch the scheduling loop.
    ///
    /// Does nothing while a run is in progress, including one that has been
    /// asked to stop but has not left its loop yet. If the grid cannot be
    /// allocated, or the first frame cannot be, the error is returned, no run
    /// begins and the driver stays as it was.
    pub fn start(&mut self) -> Result<()> {
        if self.state() == RunState::Running {
            debug!("start ignored, a run is already in progress");
            return Ok(());
        }

        let Config { width, height, interval, max_generations, pattern, .. } = self.config;
        let mut grid = Grid::new(width, height)?;
        match pattern {
            Some(pattern) => {
                let (x, y) = pattern.centred_origin(width, height);
                grid.stamp(pattern, x, y);
            }
            None => grid.randomize(&mut self.rng),
        }
        let frame = Frame::capture(&grid, 0)?;

        info!(
            "starting {}x{} run from {}, population {}",
            width,
            height,
            pattern.map_or("random cells", |p| p.name),
            grid.population()
        );
        self.frames.send_replace(frame);

        let (notify_shutdown, shutdown) = broadcast::channel(1);
        let handle = self.handle.spawn(simulate(
            grid,
            self.frames.clone(),
            shutdown,
            interval,
            max_generations,
        ));
        self.run = Run::Active { notify_shutdown, handle };
        Ok(())
    }

    /// Ask the active run to end after its current generation. Safe to call
    /// any number of times, with or without a run.
    pub fn stop(&self) {
        match &self.run {
            Run::Active { notify_shutdown, handle } if !handle.is_finished() => {
                // Fails only once the loop has already gone.
                let _ = notify_shutdown.send(());
                debug!("stop requested");
            }
            _ => debug!("stop ignored, no run in progress"),
        }
    }

    /// Wait for the active run's loop to exit. Returns at once when there
    /// is none. Without a prior `stop` this waits for the generation limit.
    pub async fn join(&mut self) {
        if let Run::Active { handle, .. } = &mut self.run {
            if let Err(err) = handle.await {
                error!("simulation task failed: {:?}", err);
            }
            self.run = Run::Finished;
        }
    }

    /// Borrow the latest published generation. Hold the borrow only for the
    /// duration of one render: the worker cannot publish while it is held.
    pub fn frame(&self) -> watch::Ref<'_, Frame> {
        self.frames.borrow()
    }

    /// Receiver that is marked changed every time a generation is published.
    pub fn subscribe(&self) -> watch::Receiver<Frame> {
        self.frames.subscribe()
    }

    /// Iteration of the latest published generation.
    pub fn iteration_count(&self) -> u64 {
        self.frames.borrow().iteration
    }

    /// Record the drawable area reported by the UI.
    pub fn resize(&mut self, width: u32, height: u32) {
        debug!("viewport resized to {}x{}", width, height);
        self.viewport = Viewport { width, height };
    }

    /// Drawable area last passed to `resize`.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.stop();
        // The loop is parked in its wait whenever it is not stepping, so
        // dropping its task never cuts a generation short.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// The scheduling loop: step, publish, then wait one quantum for a stop.
async fn simulate(
    mut grid: Grid,
    frames: Arc<watch::Sender<Frame>>,
    mut shutdown: broadcast::Receiver<()>,
    interval: Duration,
    max_generations: Option<u64>,
) {
    let limit = max_generations.unwrap_or(u64::MAX);
    let mut iteration = 0;

    while iteration < limit {
        iteration += 1;
        grid.step();
        frames.send_modify(|frame| frame.publish(&grid, iteration));
        trace!("published generation {}", iteration);

        if iteration == limit {
            break;
        }

        tokio::select! {
            biased;
            // A closed channel means the driver is gone.
            _ = shutdown.recv() => break,
            _ = time::sleep(interval) => {}
        }
    }

    info!("run stopped after {} generations", iteration);
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Instant;

    use super::*;
    use crate::error::LifeError;
    use crate::patterns;

    const WAIT: Duration = Duration::from_secs(5);

    fn config(width: usize, height: usize) -> Config {
        Config {
            width,
            height,
            interval: Duration::from_millis(1),
            seed: Some(7),
            ..Config::default()
        }
    }

    async fn wait_for_iteration(driver: &Driver, iteration: u64) {
        let mut frames = driver.subscribe();
        time::timeout(WAIT, frames.wait_for(|frame| frame.iteration >= iteration))
            .await
            .expect("timed out waiting for a generation")
            .expect("driver dropped");
    }

    async fn run_to_completion(driver: &mut Driver) {
        driver.start().unwrap();
        time::timeout(WAIT, driver.join()).await.expect("run did not finish");
    }

    #[tokio::test]
    async fn test_idle_driver() {
        let mut driver = Driver::new(config(10, 10)).unwrap();

        assert_eq!(driver.state(), RunState::Idle);
        assert_eq!(driver.iteration_count(), 0);
        assert_eq!(*driver.frame(), Frame::default());

        driver.stop();
        driver.stop();
        driver.join().await;
        assert_eq!(driver.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn test_counts_generations() {
        let mut driver = Driver::new(Config { max_generations: Some(1), ..config(8, 8) }).unwrap();
        run_to_completion(&mut driver).await;
        assert_eq!(driver.iteration_count(), 1);

        let mut driver = Driver::new(Config { max_generations: Some(12), ..config(8, 8) }).unwrap();
        run_to_completion(&mut driver).await;
        assert_eq!(driver.state(), RunState::Stopped);
        assert_eq!(driver.iteration_count(), 12);
    }

    #[tokio::test]
    async fn test_seeded_run_matches_grid() {
        let mut driver = Driver::new(Config { max_generations: Some(5), ..config(16, 12) }).unwrap();
        run_to_completion(&mut driver).await;

        let mut expected = Grid::new(16, 12).unwrap();
        expected.randomize(&mut StdRng::seed_from_u64(7));
        for _ in 0..5 {
            expected.step();
        }

        let frame = driver.frame();
        assert_eq!((frame.width, frame.height, frame.iteration), (16, 12, 5));
        assert_eq!(frame.cells(), expected.current_buffer());
    }

    #[tokio::test]
    async fn test_blinker_run() {
        let blinker = Config { pattern: Some(&patterns::BLINKER), ..config(3, 3) };
        let horizontal: BTreeSet<_> = [(0, 1), (1, 1), (2, 1)].into_iter().collect();
        let vertical: BTreeSet<_> = [(1, 0), (1, 1), (1, 2)].into_iter().collect();

        let mut driver = Driver::new(Config { max_generations: Some(1), ..blinker.clone() }).unwrap();
        run_to_completion(&mut driver).await;
        assert_eq!(driver.frame().live_cells().collect::<BTreeSet<_>>(), vertical);

        let mut driver = Driver::new(Config { max_generations: Some(2), ..blinker }).unwrap();
        run_to_completion(&mut driver).await;
        assert_eq!(driver.frame().live_cells().collect::<BTreeSet<_>>(), horizontal);
    }

    #[tokio::test]
    async fn test_empty_grid_still_counts() {
        let mut driver = Driver::new(Config { max_generations: Some(3), ..config(0, 0) }).unwrap();
        run_to_completion(&mut driver).await;
        assert_eq!(driver.iteration_count(), 3);
        assert_eq!(driver.frame().population(), 0);
    }

    #[tokio::test]
    async fn test_stop_ends_run_within_a_quantum() {
        // A long quantum: the run can only end quickly if the stop signal
        // interrupts the wait.
        let mut driver = Driver::new(Config { interval: Duration::from_secs(30), ..config(20, 20) }).unwrap();
        driver.start().unwrap();
        assert_eq!(driver.state(), RunState::Running);
        wait_for_iteration(&driver, 1).await;
        let before = driver.iteration_count();

        let started = Instant::now();
        driver.stop();
        time::timeout(WAIT, driver.join()).await.expect("stop was not honoured");

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(driver.state(), RunState::Stopped);
        assert!(driver.iteration_count() <= before + 1);

        driver.stop();
        assert_eq!(driver.state(), RunState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_while_stepping_fast() {
        let mut driver = Driver::new(Config { interval: Duration::ZERO, ..config(64, 64) }).unwrap();
        driver.start().unwrap();
        wait_for_iteration(&driver, 10).await;

        driver.stop();
        let at_stop = driver.iteration_count();
        time::timeout(WAIT, driver.join()).await.expect("stop was not honoured");

        assert!(driver.iteration_count() <= at_stop + 1);
        assert_eq!(driver.frame().cells().len(), 64 * 64);
    }

    #[tokio::test]
    async fn test_start_while_running_is_ignored() {
        let mut driver = Driver::new(Config { interval: Duration::from_secs(30), ..config(20, 20) }).unwrap();
        driver.start().unwrap();
        wait_for_iteration(&driver, 1).await;
        let frame = driver.frame().clone();

        driver.start().unwrap();

        assert_eq!(driver.state(), RunState::Running);
        assert_eq!(*driver.frame(), frame);

        driver.stop();
        time::timeout(WAIT, driver.join()).await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let mut driver = Driver::new(Config { max_generations: Some(4), ..config(10, 10) }).unwrap();
        run_to_completion(&mut driver).await;
        run_to_completion(&mut driver).await;

        // The second run is seeded by the next draws of the same source
        let mut rng = StdRng::seed_from_u64(7);
        Grid::new(10, 10).unwrap().randomize(&mut rng);
        let mut expected = Grid::new(10, 10).unwrap();
        expected.randomize(&mut rng);
        for _ in 0..4 {
            expected.step();
        }

        assert_eq!(driver.state(), RunState::Stopped);
        assert_eq!(driver.iteration_count(), 4);
        assert_eq!(driver.frame().cells(), expected.current_buffer());
    }

    #[tokio::test]
    async fn test_allocation_failure_keeps_idle() {
        let mut driver = Driver::new(config(usize::MAX, 2)).unwrap();

        match driver.start() {
            Err(LifeError::Allocation { width, height }) => assert_eq!((width, height), (usize::MAX, 2)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(driver.state(), RunState::Idle);
        assert_eq!(*driver.frame(), Frame::default());
    }

    #[test]
    fn test_capture_copies_live_generation() {
        let mut grid = Grid::from_live_cells(3, 3, &[(1, 0), (1, 1), (1, 2)]).unwrap();
        grid.step();

        let frame = Frame::capture(&grid, 1).unwrap();

        assert_eq!((frame.width, frame.height, frame.iteration), (3, 3, 1));
        assert_eq!(frame.cells(), grid.current_buffer());
        assert!(frame.is_alive(0, 1) && !frame.is_alive(1, 0));
        assert_ne!(frame.cells().as_ptr(), grid.current_buffer().as_ptr());
    }

    #[test]
    #[should_panic]
    fn test_is_alive_out_of_bounds() {
        let grid = Grid::new(3, 2).unwrap();
        Frame::capture(&grid, 0).unwrap().is_alive(0, 2);
    }

    #[tokio::test]
    async fn test_live_frames_match_their_iteration() {
        let mut driver = Driver::new(config(16, 16)).unwrap();
        driver.start().unwrap();

        let mut seeded = Grid::new(16, 16).unwrap();
        seeded.randomize(&mut StdRng::seed_from_u64(7));

        for target in [2, 5, 9] {
            wait_for_iteration(&driver, target).await;
            let frame = driver.frame().clone();
            assert!(frame.iteration >= target);

            let mut expected = seeded.clone();
            for _ in 0..frame.iteration {
                expected.step();
            }
            assert_eq!(frame.cells(), expected.current_buffer(), "generation {}", frame.iteration);
        }

        driver.stop();
        time::timeout(WAIT, driver.join()).await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_while_running() {
        let mut driver = Driver::new(Config { interval: Duration::from_secs(30), ..config(20, 20) }).unwrap();
        driver.start().unwrap();
        wait_for_iteration(&driver, 1).await;
        drop(driver);
    }

    #[tokio::test]
    async fn test_subscriber_sees_new_generations() {
        let mut driver = Driver::new(config(12, 12)).unwrap();
        let mut frames = driver.subscribe();
        driver.start().unwrap();

        time::timeout(WAIT, frames.changed()).await.unwrap().unwrap();
        {
            let frame = frames.borrow_and_update();
            assert_eq!(frame.cells().len(), 144);
        }
        wait_for_iteration(&driver, 3).await;

        driver.stop();
        time::timeout(WAIT, driver.join()).await.unwrap();
    }

    #[test]
    fn test_resize_leaves_grid_alone() {
        let mut driver = Driver::new(config(10, 6)).unwrap();
        driver.resize(1920, 1080);

        assert_eq!(driver.viewport(), Viewport { width: 1920, height: 1080 });
        assert_eq!((driver.config().width, driver.config().height), (10, 6));
    }
}
