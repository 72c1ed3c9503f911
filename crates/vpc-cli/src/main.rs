use uuid::Uuid;

use vpc_core::WorkflowStore;
use vpc_persistence::{build_dev_pool_from_env, PgWorkflowStore, PoolProvider};

// CLI mínima de inspección contra el backend persistente:
//   vpc-cli roots
//   vpc-cli tasks --root <UUID>
//   vpc-cli transitions --task <UUID>
fn main() {
    // Cargar .env si existe para obtener DATABASE_URL
    let _ = dotenvy::dotenv();
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("");

    if !matches!(command, "roots" | "tasks" | "transitions") {
        println!("vpc-cli: use 'roots', 'tasks --root <UUID>' or 'transitions --task <UUID>'");
        std::process::exit(2);
    }
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("[vpc-cli] requiere DATABASE_URL para operar contra el backend persistente");
        std::process::exit(4);
    }
    let pool = match build_dev_pool_from_env() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("[vpc-cli] pool error: {e}");
            std::process::exit(5);
        }
    };
    let store = PgWorkflowStore::new(PoolProvider { pool });

    match command {
        "roots" => {
            let ids = match store.all_root_ids() {
                Ok(ids) => ids,
                Err(e) => {
                    eprintln!("[vpc-cli] error listando roots: {e}");
                    std::process::exit(5);
                }
            };
            for id in ids {
                match store.root(id) {
                    Ok(root) => println!("{}  {:<12} {:<10} {:<10} {}",
                                         root.id,
                                         root.status.as_str(),
                                         root.nature.as_str(),
                                         root.root_type.as_str(),
                                         root.workflow_name),
                    Err(e) => eprintln!("[vpc-cli] root {id}: {e}"),
                }
            }
        }
        "tasks" => {
            let Some(root_id) = flag_uuid(&args, "--root") else {
                eprintln!("Uso: vpc-cli tasks --root <UUID>");
                std::process::exit(2);
            };
            match store.tasks_of_root(root_id) {
                Ok(tasks) => {
                    for task in tasks {
                        println!("{}  {:<13} {}/{}  {}",
                                 task.id,
                                 task.status.as_str(),
                                 task.task_type,
                                 task.resource_type,
                                 task.message);
                    }
                }
                Err(e) => {
                    eprintln!("[vpc-cli] error listando tasks de {root_id}: {e}");
                    std::process::exit(4);
                }
            }
        }
        "transitions" => {
            let Some(task_id) = flag_uuid(&args, "--task") else {
                eprintln!("Uso: vpc-cli transitions --task <UUID>");
                std::process::exit(2);
            };
            match store.transitions_of_task(task_id) {
                Ok(transitions) => {
                    for t in transitions {
                        println!("{:>6}  {} -> {}  {}  {}",
                                 t.seq,
                                 t.from.as_str(),
                                 t.to.as_str(),
                                 t.ts.to_rfc3339(),
                                 t.message);
                    }
                }
                Err(e) => {
                    eprintln!("[vpc-cli] error listando transiciones de {task_id}: {e}");
                    std::process::exit(5);
                }
            }
        }
        _ => unreachable!(),
    }
}

fn flag_uuid(args: &[String], flag: &str) -> Option<Uuid> {
    let mut i = 2;
    while i < args.len() {
        if args[i] == flag {
            return args.get(i + 1).and_then(|v| Uuid::parse_str(v).ok());
        }
        i += 1;
    }
    None
}
