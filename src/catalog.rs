//! # Launch-point catalog types.
//!
//! A launch point identifies "this app, launched this way". The catalog is
//! the keeper of launch points and outlives every running instance; running
//! apps hold strong references to their launch point, and the catalog never
//! looks back at apps.
//!
//! The canonical default launch point for an app is `"<appId>_default"`.

use std::sync::Arc;

/// Application type, selecting the life-handler backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppType {
    /// Web application, driven by the web runtime.
    Web,
    /// Native binary.
    Native,
    /// QML native application, driven by the QML booster.
    NativeQml,
}

impl AppType {
    /// Returns the wire name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            AppType::Web => "web",
            AppType::Native => "native",
            AppType::NativeQml => "native_qml",
        }
    }
}

/// Static description of an installed application.
#[derive(Debug, Clone)]
pub struct AppDescriptor {
    app_id: String,
    app_type: AppType,
    /// Absolute path of the entry point (meaningful for QML apps).
    main: String,
    /// Whether the app was installed through devmode.
    devmode: bool,
}

impl AppDescriptor {
    /// Creates a new descriptor.
    pub fn new(app_id: impl Into<String>, app_type: AppType) -> Self {
        Self {
            app_id: app_id.into(),
            app_type,
            main: String::new(),
            devmode: false,
        }
    }

    /// Sets the absolute entry point path.
    pub fn with_main(mut self, main: impl Into<String>) -> Self {
        self.main = main.into();
        self
    }

    /// Marks the app as a devmode install.
    pub fn with_devmode(mut self, devmode: bool) -> Self {
        self.devmode = devmode;
        self
    }

    /// Returns the app id.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Returns the app type.
    pub fn app_type(&self) -> AppType {
        self.app_type
    }

    /// Returns the absolute entry point path.
    pub fn main(&self) -> &str {
        &self.main
    }

    /// Returns true for devmode installs.
    pub fn is_devmode(&self) -> bool {
        self.devmode
    }
}

/// A catalog entry: one way of launching one app.
#[derive(Debug)]
pub struct LaunchPoint {
    launch_point_id: String,
    descriptor: AppDescriptor,
}

impl LaunchPoint {
    /// Creates a launch point for a descriptor.
    pub fn new(launch_point_id: impl Into<String>, descriptor: AppDescriptor) -> Self {
        Self {
            launch_point_id: launch_point_id.into(),
            descriptor,
        }
    }

    /// Creates the canonical `"<appId>_default"` launch point.
    pub fn default_for(descriptor: AppDescriptor) -> Self {
        let launch_point_id = format!("{}_default", descriptor.app_id());
        Self::new(launch_point_id, descriptor)
    }

    /// Returns the launch point id.
    pub fn launch_point_id(&self) -> &str {
        &self.launch_point_id
    }

    /// Returns the app descriptor.
    pub fn descriptor(&self) -> &AppDescriptor {
        &self.descriptor
    }

    /// Returns the app id of the descriptor.
    pub fn app_id(&self) -> &str {
        self.descriptor.app_id()
    }

    /// Returns the app type of the descriptor.
    pub fn app_type(&self) -> AppType {
        self.descriptor.app_type()
    }
}

/// The set of known launch points.
///
/// Kept deliberately small: the package layer owns installation and
/// enumeration; the lifecycle core only resolves ids.
#[derive(Default)]
pub struct LaunchPointCatalog {
    points: Vec<Arc<LaunchPoint>>,
}

impl LaunchPointCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a launch point to the catalog.
    pub fn add(&mut self, launch_point: LaunchPoint) -> Arc<LaunchPoint> {
        let launch_point = Arc::new(launch_point);
        self.points.push(Arc::clone(&launch_point));
        launch_point
    }

    /// Resolves a launch point by id.
    pub fn get_by_launch_point_id(&self, launch_point_id: &str) -> Option<Arc<LaunchPoint>> {
        self.points
            .iter()
            .find(|lp| lp.launch_point_id() == launch_point_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_launch_point_id_is_canonical() {
        let lp = LaunchPoint::default_for(AppDescriptor::new("tv.menu", AppType::Web));
        assert_eq!(lp.launch_point_id(), "tv.menu_default");
        assert_eq!(lp.app_id(), "tv.menu");
    }

    #[test]
    fn catalog_resolves_by_id() {
        let mut catalog = LaunchPointCatalog::new();
        catalog.add(LaunchPoint::default_for(AppDescriptor::new(
            "tv.menu",
            AppType::Web,
        )));
        assert!(catalog.get_by_launch_point_id("tv.menu_default").is_some());
        assert!(catalog.get_by_launch_point_id("tv.settings_default").is_none());
    }
}
