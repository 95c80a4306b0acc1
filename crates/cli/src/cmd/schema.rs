use hookdeck_deploy_lib::schema::{MANIFEST_SCHEMA, PROJECT_SCHEMA};

pub fn cmd_schema(project: bool) {
  if project {
    print!("{PROJECT_SCHEMA}");
  } else {
    print!("{MANIFEST_SCHEMA}");
  }
}
