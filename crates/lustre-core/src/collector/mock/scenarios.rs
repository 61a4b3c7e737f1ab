//! Pre-built mock filesystem scenarios for testing.
//!
//! These scenarios provide realistic `/proc/fs/lustre`, `/proc/sys/lnet` and
//! `/sys/fs/lustre` trees as found on a combined MGS/MDS/OSS test node.

use super::filesystem::MockFs;

const OST_STATS: &str = "\
snapshot_time             1495035142.697801 secs.usecs
read_bytes                1262 samples [bytes] 1024 1048576 5672395063
write_bytes               432 samples [bytes] 1024 1048576 375920472
setattr                   2 samples [reqs]
punch                     1 samples [reqs]
sync                      8 samples [reqs]
destroy                   95 samples [reqs]
create                    12 samples [reqs]
statfs                    81813 samples [reqs]
get_info                  2 samples [reqs]
set_info                  17 samples [reqs]
";

const MD_STATS: &str = "\
snapshot_time             1495035142.690375 secs.usecs
open                      1017 samples [reqs]
close                     1003 samples [reqs]
mknod                     2 samples [reqs]
unlink                    58 samples [reqs]
mkdir                     9 samples [reqs]
getattr                   2345 samples [reqs]
setattr                   14 samples [reqs]
statfs                    81808 samples [reqs]
";

const OST_JOB_STATS: &str = "\
job_stats:
- job_id:          29
  snapshot_time:   1493326943
  read_bytes:      { samples:           0, unit: bytes, min:       0, max:       0, sum:               0 }
  write_bytes:     { samples:         262, unit: bytes, min: 1048576, max: 1048576, sum:       274726912 }
  getattr:         { samples:           0, unit:  reqs }
  setattr:         { samples:           0, unit:  reqs }
  punch:           { samples:           0, unit:  reqs }
  sync:            { samples:           0, unit:  reqs }
  destroy:         { samples:           0, unit:  reqs }
  create:          { samples:           0, unit:  reqs }
  statfs:          { samples:           0, unit:  reqs }
  get_info:        { samples:           0, unit:  reqs }
  set_info:        { samples:           0, unit:  reqs }
  quotactl:        { samples:           0, unit:  reqs }
- job_id:          30
  snapshot_time:   1493326944
  read_bytes:      { samples:          12, unit: bytes, min:    4096, max: 1048576, sum:         5242880 }
  write_bytes:     { samples:           0, unit: bytes, min:       0, max:       0, sum:               0 }
  getattr:         { samples:           3, unit:  reqs }
  punch:           { samples:           1, unit:  reqs }
";

const MDT_JOB_STATS: &str = "\
job_stats:
- job_id:          31
  snapshot_time:   1493326945
  open:            { samples:           3, unit:  reqs }
  close:           { samples:           3, unit:  reqs }
  mknod:           { samples:           0, unit:  reqs }
  getattr:         { samples:           5, unit:  reqs }
";

const BRW_STATS: &str = "\
snapshot_time:         1495035142.697801 (secs.usecs)

                           read      |     write
pages per bulk r/w     rpcs  %   cum % |  rpcs % cum %
1:                     14    53  53    |  0    0 0
2:                     12    46  100   |  0    0 0

                           read      |     write
discontiguous pages    rpcs  %   cum % |  rpcs  % cum %
0:                     26    100 100   |  0     0 0
1:                      0      0 100   |  0     0 0

                           read      |     write
disk I/Os in flight    ios   %   cum % |  ios % cum %
1:                     26    100 100   |  0   0 0
2:                      0      0 100   |  0   0 0

                           read      |     write
I/O time (1/1000s)     ios   %  cum %  |  ios % cum %
1:                     2     50  50    |  0   0 0
2:                     0      0  50    |  0   0 0
32:                    2     50 100    |  0   0 0

                           read      |     write
disk I/O size          ios  %  cum %   |  ios % cum %
8:                      4   15  15     |  0   0   0
16:                     0    0  15     |  0   0   0
1K:                     2    7  46     |  0   0   0
8K:                    14   53 100     |  0   0   0
";

const RPC_STATS: &str = "\
snapshot_time:         1495035142.697801 (secs.usecs)
read RPCs in flight:  0
write RPCs in flight: 0
pending write pages:  0
pending read pages:   0

                        read                    write
pages per rpc         rpcs   % cum % |       rpcs   % cum %
1:                       3  60  60   |          1 100 100
2:                       2  40 100   |          0   0 100

                        read                    write
rpcs in flight        rpcs   % cum % |       rpcs   % cum %
0:                       5 100 100   |          1 100 100

                        read                    write
offset                rpcs   % cum % |       rpcs   % cum %
0:                       5 100 100   |          1 100 100
";

const LLITE_STATS: &str = "\
snapshot_time             1495035142.701236 secs.usecs
read_bytes                26 samples [bytes] 0 4194304 37486600
write_bytes               11 samples [bytes] 24 4194304 29360152
open                      44 samples [regs]
close                     44 samples [regs]
getattr                   90 samples [regs]
";

#[allow(dead_code)]
impl MockFs {
    /// Creates a combined MGS/MDS/OSS node with two OSTs, one MDT, a client
    /// mount, LNet and health files.
    pub fn lustre_server() -> Self {
        let mut fs = Self::new();
        let lustre = "/proc/fs/lustre";

        fs.add_file(format!("{lustre}/health_check"), "healthy\n");
        fs.add_file("/sys/fs/lustre/health_check", "healthy\n");

        for (ost, avail) in [("lustre-OST0000", "8112"), ("lustre-OST0001", "9216")] {
            let dir = format!("{lustre}/obdfilter/{ost}");
            for (file, value) in [
                ("blocksize", "4096"),
                ("brw_size", "1"),
                ("degraded", "0"),
                ("filesfree", "54118"),
                ("filestotal", "55296"),
                ("grant_compat_disable", "0"),
                ("grant_precreate", "278921216"),
                ("job_cleanup_interval", "600"),
                ("kbytesavail", avail),
                ("kbytesfree", "9972"),
                ("kbytestotal", "10240"),
                ("lfsck_speed_limit", "0"),
                ("num_exports", "2"),
                ("precreate_batch", "128"),
                ("recovery_time_hard", "900"),
                ("recovery_time_soft", "300"),
                ("soft_sync_limit", "16"),
                ("sync_journal", "0"),
                ("tot_dirty", "0"),
                ("tot_granted", "278921216"),
                ("tot_pending", "0"),
            ] {
                fs.add_file(format!("{dir}/{file}"), format!("{value}\n"));
            }
            fs.add_file(format!("{dir}/stats"), OST_STATS);
            fs.add_file(format!("{dir}/job_stats"), OST_JOB_STATS);
            fs.add_file(format!("{dir}/brw_stats"), BRW_STATS);

            let ns = format!("{lustre}/ldlm/namespaces/filter-{ost}_UUID");
            for (file, value) in [
                ("lock_count", "12"),
                ("lock_timeouts", "0"),
                ("contended_locks", "32"),
                ("contention_seconds", "2"),
                ("pool/granted", "12"),
                ("pool/grant_rate", "0"),
                ("pool/cancel_rate", "0"),
                ("pool/grant_speed", "0"),
            ] {
                fs.add_file(format!("{ns}/{file}"), format!("{value}\n"));
            }
        }

        let mdt = format!("{lustre}/mdt/lustre-MDT0000");
        fs.add_file(format!("{mdt}/num_exports"), "3\n");
        fs.add_file(format!("{mdt}/md_stats"), MD_STATS);
        fs.add_file(format!("{mdt}/job_stats"), MDT_JOB_STATS);

        for osd in ["mgs/MGS/osd", "mds/MDS/osd"] {
            for (file, value) in [
                ("blocksize", "4096"),
                ("filesfree", "32511"),
                ("filestotal", "32768"),
                ("kbytesavail", "463708"),
                ("kbytesfree", "489920"),
                ("kbytestotal", "491092"),
                ("quota_iused_estimate", "0"),
            ] {
                fs.add_file(format!("{lustre}/{osd}/{file}"), format!("{value}\n"));
            }
        }

        let llite = format!("{lustre}/llite/lustre-ffff8803f6e3d000");
        for (file, value) in [
            ("blocksize", "4096"),
            ("checksum_pages", "1"),
            ("default_easize", "72"),
            ("filesfree", "108236"),
            ("filestotal", "110592"),
            ("kbytesavail", "16224"),
            ("kbytesfree", "19944"),
            ("kbytestotal", "20480"),
            ("lazystatfs", "1"),
            ("max_read_ahead_mb", "64"),
            ("max_read_ahead_per_file_mb", "64"),
            ("max_read_ahead_whole_mb", "2"),
            ("statahead_agl", "1"),
            ("statahead_max", "32"),
            ("xattr_cache", "1"),
        ] {
            fs.add_file(format!("{llite}/{file}"), format!("{value}\n"));
        }
        fs.add_file(format!("{llite}/stats"), LLITE_STATS);
        fs.add_file(
            format!("{lustre}/osc/lustre-OST0000-osc-ffff8803f6e3d000/rpc_stats"),
            RPC_STATS,
        );
        fs.add_file(
            format!("{lustre}/mdc/lustre-MDT0000-mdc-ffff8803f6e3d000/rpc_stats"),
            RPC_STATS,
        );

        Self::add_lnet(&mut fs);
        fs
    }

    /// Creates a client-only node: LNet up, no server targets, and a
    /// `health_check` reporting trouble.
    pub fn lustre_unhealthy_client() -> Self {
        let mut fs = Self::new();
        fs.add_file("/proc/fs/lustre/health_check", "NOT HEALTHY\n");
        fs.add_file("/sys/fs/lustre/health_check", "NOT HEALTHY\n");
        fs.add_file(
            "/proc/fs/lustre/llite/lustre-ffff8803f6e3d000/stats",
            LLITE_STATS,
        );
        Self::add_lnet(&mut fs);
        fs
    }

    fn add_lnet(fs: &mut MockFs) {
        let lnet = "/proc/sys/lnet";
        for (file, value) in [
            ("catastrophe", "0"),
            ("console_backoff", "2"),
            ("console_max_delay_centisecs", "60000"),
            ("console_min_delay_centisecs", "50"),
            ("console_ratelimit", "1"),
            ("debug_mb", "81"),
            ("fail_err", "0"),
            ("fail_val", "0"),
            ("lnet_memused", "17427424"),
            ("panic_on_lbug", "1"),
            ("watchdog_ratelimit", "300"),
        ] {
            fs.add_file(format!("{lnet}/{file}"), format!("{value}\n"));
        }
        fs.add_file(
            format!("{lnet}/stats"),
            "0 16 0 1911487 1898918 0 0 498100008 543996712 0 0\n",
        );
    }
}
