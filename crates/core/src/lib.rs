pub mod shared {
    pub mod config;
    pub mod constants;
    pub mod frame;
    pub mod model_resolver;
}

pub mod camera {
    pub mod domain {
        pub mod frame_processing;
        pub mod frame_source;
        pub mod stream_connection;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod detection;
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod capture {
    pub mod domain {
        pub mod capture_state_machine;
        pub mod target_zone;
    }
}

pub mod overlay {
    pub mod domain {
        pub mod frame_overlay;
        pub mod status_color;
    }
    pub mod infrastructure;
}

pub mod session {
    pub mod domain {
        pub mod media_ports;
        pub mod session_controller;
        pub mod session_event;
    }
    pub mod infrastructure;
}
