//! Navigation seam used when the guard locks

use std::sync::Mutex;

/// Navigation capability supplied by the host
pub trait Navigator: Send + Sync {
    /// Navigate to a route
    fn navigate(&self, route: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn navigate(&self, route: &str) {
        self(route)
    }
}

/// Navigator that records visited routes
pub struct NavigationHistory {
    /// Navigation history stack
    history: Mutex<Vec<String>>,
    /// Maximum history depth
    max_depth: usize,
}

impl NavigationHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self {
            history: Mutex::new(Vec::new()),
            max_depth: 20,
        }
    }

    /// Most recent route
    pub fn current(&self) -> Option<String> {
        self.lock().last().cloned()
    }

    /// How many recorded navigations targeted `route`
    pub fn visits(&self, route: &str) -> usize {
        self.lock().iter().filter(|r| r.as_str() == route).count()
    }

    /// Recorded routes, oldest first
    pub fn routes(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Clear navigation history
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for NavigationHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for NavigationHistory {
    fn navigate(&self, route: &str) {
        let mut history = self.lock();

        // Limit history depth
        if history.len() >= self.max_depth {
            history.remove(0);
        }

        history.push(route.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_history_records_routes() {
        let history = NavigationHistory::new();
        assert!(history.current().is_none());

        history.navigate("/home");
        history.navigate("/lock");
        assert_eq!(history.current().as_deref(), Some("/lock"));
        assert_eq!(history.visits("/lock"), 1);
        assert_eq!(history.routes(), vec!["/home", "/lock"]);

        history.clear();
        assert!(history.routes().is_empty());
    }

    #[test]
    fn test_history_depth_is_bounded() {
        let history = NavigationHistory::new();
        for i in 0..25 {
            history.navigate(&format!("/page/{}", i));
        }
        let routes = history.routes();
        assert_eq!(routes.len(), 20);
        assert_eq!(routes[0], "/page/5");
    }

    #[test]
    fn test_closure_navigator() {
        let calls = AtomicUsize::new(0);
        let navigator = |route: &str| {
            assert_eq!(route, "/lock");
            calls.fetch_add(1, Ordering::SeqCst);
        };
        navigator.navigate("/lock");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
