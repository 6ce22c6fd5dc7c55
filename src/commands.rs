//! Remote command lines understood by deployed nodes. These strings must stay
//! byte-for-byte compatible with the monitor service installation.

use crate::model::ServiceParameters;

pub const SESSION_PROBE: &str = r#"screen -list | grep -q "LACCS""#;
pub const STANDALONE_PROBE: &str = r#"ps -ef | grep -v grep | grep -v screen | grep -q "LACCS""#;
pub const STOP_SESSION: &str = "screen -S LACCS -X quit";
pub const KILL_PROCESS: &str = "pkill -f LACCS";

pub const LIBRARY_DIR: &str = "/opt/LACCS/Controls/";
pub const LIBRARY_BACKUP: &str = "mv /opt/LACCS/Controls/libBeamLossMonitor.so* /tmp";
pub const NODE_CONFIG_PATH: &str = "/opt/LACCS#/configs/node.config";
pub const NODE_TABLE_PATH: &str = "/opt/LACCS#/FileDB/NODES.tsv";

/// Launch command using the configured install path.
pub fn start_command(params: &ServiceParameters) -> String {
    start_command_in(&params.install_path, params)
}

/// Launch command run from `dir` instead of the configured install path.
pub fn start_command_in(dir: &str, params: &ServiceParameters) -> String {
    let [c0, c1, c2, c3, c4, c5] = &params.channels;
    format!(
        "screen -wipe; screen -L -dmS LACCS bash -lc \"cd {} && ulimit -n 204800 && ulimit -s 81920 && ./LACCS --user_name=guest --password=guest_password --data_id=uptodate --D:node_name={} --D:device_name={} --D:ch00={} --D:ch01={} --D:ch02={} --D:ch03={} --D:ch04={} --D:ch05={}; exec bash\"",
        dir, params.node_name, params.device_name, c0, c1, c2, c3, c4, c5
    )
}

pub fn library_path(filename: &str) -> String {
    format!("{}{}", LIBRARY_DIR, filename)
}

pub fn upload_tmp_path(filename: &str) -> String {
    format!("/tmp/{}", filename)
}

pub fn dir_exists_check(dir: &str) -> String {
    format!("test -d {} && echo 'exists' || echo 'not exists'", dir)
}

pub fn make_dir(dir: &str) -> String {
    format!("mkdir -p {}", dir)
}

pub fn clear_dir(dir: &str) -> String {
    format!("rm -rf {}/*", dir.trim_end_matches('/'))
}

pub fn extract_archive(archive: &str, dir: &str) -> String {
    format!("tar -xzf {} -C {}", archive, dir)
}

pub fn remove_file(path: &str) -> String {
    format!("rm {}", path)
}
