//! Service core
//!
//! Owns everything the daemon controls: the loaded configs, the fans, the
//! sensor hub, and the open EC backend. Initialization is staged so that a
//! failure after the EC has been opened restores the hardware before the
//! error propagates. All mutation goes through one `Mutex`, so a control
//! tick and a client command never interleave.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nf_core::constants::{limits, paths};
use nf_core::engine::registers;
use nf_core::hw::{self, EcTrace, EmbeddedController, SensorHub};
use nf_core::{
    EcKind, Fan, FanTemperatureControl, ModelConfig, ServiceConfig, TargetSpeed,
};
use nf_error::{Result, ResultExt};
use nf_protocol::{FanStatus, StatusReply};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};

/// Attempts made to restore the EC during cleanup
const EC_RESET_TRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub service_config_path: PathBuf,
    pub embedded_controller: Option<EcKind>,
    pub read_only: bool,
    pub trace_ec: bool,
}

pub struct Service {
    pub options: ServiceOptions,
    pub config: ServiceConfig,
    pub model: ModelConfig,
    pub fans: Vec<FanTemperatureControl>,
    pub sensors: SensorHub,
    pub ec: Box<dyn EmbeddedController + Send>,
    pub ec_kind: EcKind,
}

pub type SharedService = Arc<Mutex<Service>>;

impl Service {
    /// Bring the service up: configs, fans, EC, register writes, sensors,
    /// temperature sources.
    pub fn init(options: ServiceOptions) -> Result<Self> {
        let config = ServiceConfig::load(&options.service_config_path)?;

        info!("using model configuration '{}'", config.selected_config_id);
        let model_path = Path::new(paths::MODEL_CONFIGS_DIR)
            .join(format!("{}.json", config.selected_config_id));
        let mut model = ModelConfig::from_file(&model_path)?;
        model
            .validate()
            .with_context(|| model_path.display().to_string())?;

        let poll_interval = Duration::from_millis(model.ec_poll_interval as u64);
        let mut fans = Vec::with_capacity(model.fan_configurations.len());
        for fan_config in &model.fan_configurations {
            let fan = Fan::new(
                fan_config.clone(),
                model.critical_temperature,
                model.read_write_words,
            )?;
            fans.push(FanTemperatureControl::new(fan, poll_interval));
        }
        apply_target_speeds(&mut fans, &config.target_fan_speeds);

        let forced = options.embedded_controller.or(config.embedded_controller_type);
        let (ec_kind, mut ec) = match forced {
            Some(kind) => {
                let mut ec = hw::ec_by_kind(kind);
                ec.open()?;
                (kind, ec)
            }
            None => hw::find_working()?,
        };
        info!("using '{ec_kind}' as embedded controller");

        if options.trace_ec {
            ec = Box::new(EcTrace::new(ec));
        }

        // The EC is open from here on: a failure in any later stage has to
        // restore the hardware before the error propagates.
        match Self::init_with_ec(&options, &config, &model, &mut fans, ec.as_mut()) {
            Ok(sensors) => Ok(Self {
                options,
                config,
                model,
                fans,
                sensors,
                ec,
                ec_kind,
            }),
            Err(e) => {
                if !options.read_only {
                    let _ = reset_ec(ec.as_mut(), &model, &mut fans);
                }
                ec.close();
                Err(e)
            }
        }
    }

    fn init_with_ec(
        options: &ServiceOptions,
        config: &ServiceConfig,
        model: &ModelConfig,
        fans: &mut Vec<FanTemperatureControl>,
        ec: &mut dyn EmbeddedController,
    ) -> Result<SensorHub> {
        if !options.read_only {
            registers::apply_all(ec, &model.register_write_configurations, true)?;
        }

        let sensors = SensorHub::discover()?;

        for control in fans.iter_mut() {
            control.use_all_sensors(&sensors);
        }
        FanTemperatureControl::set_by_config(fans, &config.fan_temperature_sources, &sensors)?;

        Ok(sensors)
    }

    /// One control-loop iteration. Called with the service lock held.
    pub fn tick(&mut self) -> Result<()> {
        let mut re_init_required = false;
        for control in &mut self.fans {
            control.fan.update_current_speed(self.ec.as_mut())?;

            // A fan that drifted far off target usually means the firmware
            // reclaimed control, so the initialization writes are repeated.
            if (control.fan.current_speed() - control.fan.target_speed()).abs()
                > limits::RE_INIT_SPEED_DELTA
            {
                debug!(
                    "fan '{}' off target ({}% vs {}%), re-initialization required",
                    control.fan.display_name(),
                    control.fan.current_speed(),
                    control.fan.target_speed()
                );
                re_init_required = true;
            }
        }

        if !self.options.read_only {
            registers::apply_all(
                self.ec.as_mut(),
                &self.model.register_write_configurations,
                re_init_required,
            )?;
        }

        for control in &mut self.fans {
            control.update(&self.sensors)?;
            if !self.options.read_only {
                control.fan.ec_flush(self.ec.as_mut())?;
            }
        }

        Ok(())
    }

    /// Mirror the runtime fan modes into `TargetFanSpeeds` and persist.
    pub fn write_target_speeds_to_config(&mut self) -> Result<()> {
        self.config.target_fan_speeds = self
            .fans
            .iter()
            .map(|control| {
                if control.fan.is_auto() {
                    TargetSpeed::Auto
                } else {
                    TargetSpeed::Fixed(control.fan.requested_speed())
                }
            })
            .collect();
        self.config.store(&self.options.service_config_path)
    }

    pub fn fan_count(&self) -> usize {
        self.fans.len()
    }

    /// Consistent snapshot for the `status` command.
    pub fn status_reply(&self) -> StatusReply {
        StatusReply {
            pid: std::process::id(),
            selected_config_id: self.config.selected_config_id.clone(),
            read_only: self.options.read_only,
            fans: self
                .fans
                .iter()
                .map(|control| FanStatus {
                    name: control.fan.display_name().to_string(),
                    temperature: control.temperature(),
                    auto_mode: control.fan.is_auto(),
                    critical: control.fan.is_critical(),
                    current_speed: control.fan.current_speed(),
                    target_speed: control.fan.target_speed(),
                    requested_speed: control.fan.requested_speed(),
                    speed_steps: control.fan.speed_steps(),
                })
                .collect(),
        }
    }

    /// Restore the EC and release it.
    pub fn shutdown(&mut self) {
        if !self.options.read_only {
            if let Err(e) = reset_ec(self.ec.as_mut(), &self.model, &mut self.fans) {
                warn!("embedded controller reset failed: {e}");
            }
        }
        self.ec.close();
    }
}

/// Boot-time fan modes from the persisted target speeds.
fn apply_target_speeds(fans: &mut [FanTemperatureControl], targets: &[TargetSpeed]) {
    for (control, target) in fans.iter_mut().zip(targets.iter()) {
        match *target {
            TargetSpeed::Fixed(percent) => control.fan.set_fixed_speed(percent),
            TargetSpeed::Auto => control.fan.set_auto_speed(),
        }
    }
}

/// Restore register write configs and fan reset values.
fn reset_ec(
    ec: &mut dyn EmbeddedController,
    model: &ModelConfig,
    fans: &mut [FanTemperatureControl],
) -> Result<()> {
    let mut result = Ok(());

    for _ in 0..EC_RESET_TRIES {
        if let Err(e) = registers::reset_all(ec, &model.register_write_configurations) {
            result = Err(e);
        }
        for control in fans.iter_mut() {
            if let Err(e) = control.fan.ec_reset(ec) {
                result = Err(e);
            }
        }
    }

    result
}

/// Periodic control loop.
///
/// Ticks every `EcPollInterval` milliseconds while holding the service
/// lock for the whole tick body. Failed ticks are retried quickly; after
/// 100 consecutive failures the daemon exits with a failure status.
pub async fn run_loop(service: SharedService, quit: Arc<AtomicBool>, shutdown: Arc<Notify>) {
    let mut failures: u32 = 0;

    while !quit.load(Ordering::SeqCst) {
        let (result, poll_interval) = {
            let mut service = service.lock().await;
            let poll_interval = Duration::from_millis(service.model.ec_poll_interval as u64);
            (service.tick(), poll_interval)
        };

        let sleep_for = match result {
            Ok(()) => {
                failures = 0;
                poll_interval
            }
            Err(e) => {
                failures += 1;
                warn!("control loop failure ({failures} consecutive): {e}");
                if failures >= limits::MAX_LOOP_FAILURES {
                    error!("we tried {failures} times, exiting now");
                    std::process::exit(1);
                }
                Duration::from_millis(limits::FAILURE_RETRY_MS)
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = shutdown.notified() => break,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::service_with_two_fans;
    use super::*;
    use nf_error::Error;

    struct FailingEc;

    impl EmbeddedController for FailingEc {
        fn open(&mut self) -> Result<()> {
            Ok(())
        }
        fn close(&mut self) {}
        fn read_byte(&mut self, _register: u8) -> Result<u8> {
            Err(Error::ec("no response"))
        }
        fn write_byte(&mut self, _register: u8, _value: u8) -> Result<()> {
            Err(Error::ec("no response"))
        }
    }

    #[test]
    fn test_tick_updates_temperatures() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service_with_two_fans(&dir);

        service.tick().unwrap();
        assert_eq!(service.fans[0].temperature(), 50.0);
        assert_eq!(service.fans[1].temperature(), 50.0);
    }

    #[test]
    fn test_tick_fails_when_ec_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service_with_two_fans(&dir);
        service.ec = Box::new(FailingEc);
        assert!(service.tick().is_err());
    }

    #[test]
    fn test_boot_target_speeds_select_modes() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service_with_two_fans(&dir);

        apply_target_speeds(
            &mut service.fans,
            &[TargetSpeed::Fixed(50.0), TargetSpeed::Auto],
        );
        assert!(!service.fans[0].fan.is_auto());
        assert_eq!(service.fans[0].fan.requested_speed(), 50.0);
        assert!(service.fans[1].fan.is_auto());
    }

    #[test]
    fn test_write_target_speeds_persists_sentinels() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service_with_two_fans(&dir);

        service.fans[0].fan.set_fixed_speed(42.0);
        service.fans[1].fan.set_auto_speed();
        service.write_target_speeds_to_config().unwrap();

        let written = std::fs::read_to_string(dir.path().join("notefan.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(json["TargetFanSpeeds"][0], 42.0);
        assert_eq!(json["TargetFanSpeeds"][1], -1.0);
    }

    #[test]
    fn test_status_reply_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service_with_two_fans(&dir);
        service.fans[0].fan.set_fixed_speed(30.0);
        service.tick().unwrap();

        let reply = service.status_reply();
        assert_eq!(reply.selected_config_id, "Test Machine");
        assert!(!reply.read_only);
        assert_eq!(reply.fans.len(), 2);
        assert_eq!(reply.fans[0].name, "Fan #0");
        assert!(!reply.fans[0].auto_mode);
        assert_eq!(reply.fans[0].requested_speed, 30.0);
        assert!(reply.fans[1].auto_mode);
        assert_eq!(reply.fans[0].speed_steps, 255);
    }

    #[test]
    fn test_read_only_tick_never_writes() {
        use std::sync::atomic::AtomicU32;

        struct CountingEc(Arc<AtomicU32>);
        impl EmbeddedController for CountingEc {
            fn open(&mut self) -> Result<()> {
                Ok(())
            }
            fn close(&mut self) {}
            fn read_byte(&mut self, _register: u8) -> Result<u8> {
                Ok(0)
            }
            fn write_byte(&mut self, _register: u8, _value: u8) -> Result<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let writes = Arc::new(AtomicU32::new(0));
        let dir = tempfile::tempdir().unwrap();
        let mut service = service_with_two_fans(&dir);
        service.options.read_only = true;
        service.ec = Box::new(CountingEc(writes.clone()));

        service.fans[0].fan.set_fixed_speed(80.0);
        service.tick().unwrap();
        assert_eq!(writes.load(Ordering::SeqCst), 0);
    }
}
