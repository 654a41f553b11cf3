//! Job status, accounting and cancellation

use super::{write_table, Session};
use crate::api::{JobList, JobRecord};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::io::Write;

/// `date`-style timestamp, as the scheduler tools print them
const TIME_FORMAT: &str = "%a %b %e %H:%M:%S UTC %Y";

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Scheduler jobs only, in job number order
fn hpc_jobs(jobs: &JobList) -> impl Iterator<Item = (&u64, &JobRecord)> {
    jobs.iter().filter(|(_, job)| job.is_hpc())
}

/// `qstat`
pub fn qstat(session: &Session, cluster: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let (_, api) = session.connect(cluster)?;
    let jobs = api.jobs(false)?;
    write_qstat(&jobs, out)
}

fn write_qstat(jobs: &JobList, out: &mut dyn Write) -> Result<()> {
    let mut rows = vec![row(&[
        "job-ID",
        "prior",
        "name",
        "user",
        "state",
        "submit/start at",
        "queue",
    ])];
    for (number, job) in hpc_jobs(jobs) {
        let (state, time) = if job.is_running() {
            ("r", job.started_at().or_else(|| job.submitted_at()))
        } else {
            ("qw", job.submitted_at())
        };
        rows.push(vec![
            number.to_string(),
            "0".to_string(),
            job.job_label.clone(),
            job.job_owner_username.clone(),
            state.to_string(),
            format_time(time),
            job.job_api_submission.queue.clone(),
        ]);
    }
    write_table(out, &rows, true)
}

/// `squeue`
pub fn squeue(session: &Session, cluster: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let (_, api) = session.connect(cluster)?;
    let jobs = api.jobs(false)?;
    write_squeue(&jobs, Utc::now(), out)
}

fn write_squeue(jobs: &JobList, now: DateTime<Utc>, out: &mut dyn Write) -> Result<()> {
    let mut rows = vec![row(&[
        "JOBID",
        "PARTITION",
        "NAME",
        "USER",
        "ST",
        "TIME",
        "NODES",
        "NODELIST(REASON)",
    ])];
    for (number, job) in hpc_jobs(jobs) {
        let (state, elapsed, reason) = if job.is_running() {
            let elapsed = job
                .started_at()
                .map(|start| (now - start).num_seconds())
                .unwrap_or(0);
            ("R", elapsed, job.machine_type().to_string())
        } else {
            ("PD", 0, "(Resources)".to_string())
        };
        rows.push(vec![
            number.to_string(),
            job.job_api_submission.queue.clone(),
            job.job_label.clone(),
            job.job_owner_username.clone(),
            state.to_string(),
            format_elapsed(elapsed),
            job.node_count().to_string(),
            reason,
        ]);
    }
    write_table(out, &rows, false)
}

/// Slurm elapsed time: `M:SS`, `H:MM:SS` or `D-HH:MM:SS`
fn format_elapsed(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (days, rest) = (seconds / 86_400, seconds % 86_400);
    let (hours, minutes, secs) = (rest / 3600, rest % 3600 / 60, rest % 60);
    if days > 0 {
        format!("{days}-{hours:02}:{minutes:02}:{secs:02}")
    } else if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// `qacct`: accounting records of finished jobs
pub fn qacct(session: &Session, cluster: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let (_, api) = session.connect(cluster)?;
    let jobs = api.jobs(true)?;
    write_qacct(&jobs, out)
}

fn write_qacct(jobs: &JobList, out: &mut dyn Write) -> Result<()> {
    for (number, job) in hpc_jobs(jobs).filter(|(_, job)| job.ended_at().is_some()) {
        let owner = &job.job_owner_username;
        writeln!(out, "{}", "=".repeat(62))?;
        writeln!(out, "qname\t{}", job.job_api_submission.queue)?;
        writeln!(out, "hostname\t{}", job.machine_type())?;
        writeln!(out, "group\t{owner}")?;
        writeln!(out, "owner\t{owner}")?;
        writeln!(out, "jobname\t{}", job.job_label)?;
        writeln!(out, "jobnumber\t{number}")?;
        writeln!(out, "account\t{owner}")?;
        writeln!(out, "qsub_time\t{}", format_time(job.submitted_at()))?;
        writeln!(out, "start_time\t{}", format_time(job.started_at()))?;
        writeln!(out, "end_time\t{}", format_time(job.ended_at()))?;
        writeln!(out, "failed\t{}", u8::from(job.job_exitcode != 0))?;
        writeln!(out, "exit_status\t{}", job.job_exitcode)?;
    }
    Ok(())
}

/// `qdel`
pub fn qdel(
    session: &Session,
    cluster: Option<&str>,
    number: u64,
    force: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let (config, api) = session.connect(cluster)?;
    api.terminate(number, force)?;
    writeln!(
        out,
        "{} has registered the job {} for deletion",
        config.jarvice_user.username, number
    )?;
    Ok(())
}

/// `scancel`; silent on success
pub fn scancel(session: &Session, cluster: Option<&str>, number: u64, force: bool) -> Result<()> {
    let (_, api) = session.connect(cluster)?;
    api.terminate(number, force)
}

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{job, session, FakeApi};

    fn jobs() -> JobList {
        let mut list = JobList::new();
        let mut running = job("sim", "PROCESSING STARTING", "default", 2);
        running.job_start_time = 1_700_000_100;
        list.insert(12, running);
        list.insert(13, job("post", "SUBMITTED", "default", 1));
        list.insert(14, job("desktop", "PROCESSING STARTING", "", 1));
        list
    }

    fn render(f: impl FnOnce(&mut dyn Write) -> Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "0:00");
        assert_eq!(format_elapsed(75), "1:15");
        assert_eq!(format_elapsed(3_725), "1:02:05");
        assert_eq!(format_elapsed(90_061), "1-01:01:01");
        assert_eq!(format_elapsed(-5), "0:00");
    }

    #[test]
    fn test_qstat_lists_scheduler_jobs() {
        let text = render(|out| write_qstat(&jobs(), out));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("job-ID"));
        assert!(lines[1].starts_with("---"));
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("12"));
        assert!(lines[2].contains(" r "));
        assert!(lines[2].contains("Tue Nov 14 22:15:00 UTC 2023"));
        assert!(lines[3].contains(" qw "));
        assert!(!text.contains("desktop"));
    }

    #[test]
    fn test_squeue_states_and_elapsed() {
        let now = DateTime::from_timestamp(1_700_000_100 + 75, 0).unwrap();
        let text = render(|out| write_squeue(&jobs(), now, out));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("JOBID"));
        assert_eq!(lines.len(), 3);
        let running: Vec<&str> = lines[1].split_whitespace().collect();
        assert_eq!(running, vec!["12", "default", "sim", "alice", "R", "1:15", "2", "n3"]);
        let pending: Vec<&str> = lines[2].split_whitespace().collect();
        assert_eq!(pending[4], "PD");
        assert_eq!(pending[7], "(Resources)");
    }

    #[test]
    fn test_qacct_reports_finished_jobs() {
        let mut list = JobList::new();
        let mut failed = job("sim", "COMPLETED WITH ERROR", "default", 1);
        failed.job_end_time = 1_700_000_500;
        failed.job_exitcode = 3;
        list.insert(20, failed);
        list.insert(21, job("unfinished", "COMPLETED", "default", 1));

        let text = render(|out| write_qacct(&list, out));
        assert!(text.contains("jobnumber\t20\n"));
        assert!(text.contains("failed\t1\n"));
        assert!(text.contains("exit_status\t3\n"));
        assert!(text.contains("start_time\t-\n"));
        assert!(!text.contains("unfinished"));
    }

    #[test]
    fn test_qdel_and_scancel() {
        let api = FakeApi::default();
        let (_dir, session) = session(&api);
        let text = render(|out| qdel(&session, None, 42, false, out));
        assert_eq!(text, "alice has registered the job 42 for deletion\n");
        scancel(&session, Some("default"), 43, true).unwrap();
        assert_eq!(api.0.borrow().terminated, vec![(42, false), (43, true)]);
        assert!(scancel(&session, Some("other"), 1, false).is_err());
    }

    #[test]
    fn test_qstat_through_session() {
        let api = FakeApi::default();
        api.0.borrow_mut().active = jobs();
        let (_dir, session) = session(&api);
        let text = render(|out| qstat(&session, None, out));
        assert!(text.contains("sim"));
    }
}
