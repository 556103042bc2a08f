use std::process::Command;

fn main() {
    // check if the repository is dirty (if there is any)
    let is_dirty = if let Ok(status) = Command::new("git")
        .args(["diff-index", "--quiet", "HEAD", "--"])
        .status()
    {
        !status.success()
    } else {
        false
    };

    // use environment variable for the git commit rev if set
    let git_rev = std::env::var("DETCLOCK_GIT_REV").ok();

    // determine the git commit (if there is any)
    let git_rev = git_rev.or_else(|| {
        run_command_out("git", &["rev-parse", "HEAD"])
            .ok()
            .map(|rev| if is_dirty { format!("{rev}-dirty") } else { rev })
    });

    // use environment variable for the git commit date if set
    let git_date = std::env::var("DETCLOCK_GIT_DATE").ok();

    // determine the date of the git commit (if there is any)
    let git_date = match (git_date, &git_rev) {
        (Some(gd), _) => Some(gd),
        (None, Some(_)) if is_dirty => run_command_out("date", &["-u", "+%Y-%m-%d"]).ok(),
        (None, Some(hash)) => run_command_out(
            "git",
            &["show", "-s", "--date=format:%Y-%m-%d", "--format=%cd", hash, "--"],
        )
        .ok(),
        (None, None) => None,
    };

    println!(
        "cargo:rustc-env=DETCLOCK_GIT_REV={}",
        git_rev.unwrap_or_else(|| "-".to_owned())
    );
    println!(
        "cargo:rustc-env=DETCLOCK_GIT_DATE={}",
        git_date.unwrap_or_else(|| "-".to_owned())
    );
    println!("cargo:rerun-if-changed=.git/HEAD");
}

fn run_command_out(cmd: &str, args: &[&str]) -> std::io::Result<String> {
    let res = Command::new(cmd).args(args).output()?;
    if !res.status.success() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("{cmd} exited with {}", res.status),
        ));
    }
    String::from_utf8(res.stdout)
        .map(|data| data.trim().to_owned())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
